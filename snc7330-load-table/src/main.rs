use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use snc7330_boot::fw_block::FirmwareInfoBlock;
use snc7330_boot::load_table::{Checksum, LoadTable, TABLE_SIZE};

mod config;
mod dump;
mod rom_dump;

use config::{BlockConfig, TableConfig};

#[derive(Parser)]
#[command(version, about = "Generate and inspect SNC7330 load tables")]
struct Cli {
    /// More output, repeat for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a 4 KiB load table from an hjson config
    Generate {
        /// Config file; the reference table is used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output binary
        #[arg(short, long, default_value = "load_table.bin")]
        output: PathBuf,
    },
    /// Build a 4 KiB firmware info block from an hjson config
    FwBlock {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "fw_info.bin")]
        output: PathBuf,
    },
    /// Print the contents of a load table binary
    Dump {
        input: PathBuf,

        /// Input is a firmware info block
        #[arg(long)]
        fw_block: bool,
    },
    /// List the checksum fields the flashing tool fills in
    Checksums { input: PathBuf },
    /// Read the hidden mask ROM through the ROM's UART console
    #[cfg(feature = "dump-rom")]
    DumpRom {
        /// Serial port wired to UART0
        port: String,

        #[arg(short, long, default_value = "snc7330_core0_rom.bin")]
        output: PathBuf,

        #[arg(long, default_value_t = rom_dump::BAUD_RATE)]
        baud: u32,
    },
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_binary(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn decode_table(path: &Path) -> Result<(LoadTable, [u8; TABLE_SIZE])> {
    let bytes = read_binary(path)?;
    let table = LoadTable::decode(&bytes)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("{} is not a load table", path.display()))?;
    let mut image = [0u8; TABLE_SIZE];
    image.copy_from_slice(&bytes);
    Ok((table, image))
}

fn generate(config: Option<&Path>, output: &Path) -> Result<()> {
    let table_config = match config {
        Some(path) => {
            log::info!("Reading {}", path.display());
            TableConfig::from_hjson(&read_config(path)?)?
        }
        None => TableConfig::from_hjson("{}")?,
    };
    log::debug!("{:#?}", table_config);

    let table = table_config.to_table()?;
    let image = table
        .try_encode()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    for field in table.checksum_fields() {
        log::debug!("{} at 0x{:03X} left for the flashing tool", field.kind, field.offset);
    }

    fs::write(output, image).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {} ({} bytes)", output.display(), image.len());
    Ok(())
}

fn fw_block(config: &Path, output: &Path) -> Result<()> {
    let block = BlockConfig::from_hjson(&read_config(config)?)?.to_block()?;
    let image = block.encode();
    fs::write(output, image).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {} ({} bytes)", output.display(), image.len());
    Ok(())
}

fn dump(input: &Path, fw_block: bool) -> Result<()> {
    let mut out = String::new();
    if fw_block {
        let block = FirmwareInfoBlock::decode(&read_binary(input)?)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("{} is not a firmware info block", input.display()))?;
        dump::block(&mut out, &block)?;
    } else {
        let (table, image) = decode_table(input)?;
        dump::table(&mut out, &table, &image)?;
    }
    print!("{}", out);
    Ok(())
}

fn checksums(input: &Path) -> Result<()> {
    let (table, _) = decode_table(input)?;
    for field in table.checksum_fields() {
        let value = match field.value {
            Checksum::Pending => "pending".to_string(),
            Checksum::Value(v) => format!("0x{:08X}", v),
        };
        println!("0x{:03X}  {:<32} {}", field.offset, field.kind.to_string(), value);
    }
    Ok(())
}

#[cfg(feature = "dump-rom")]
fn dump_rom(port: &str, output: &Path, baud: u32) -> Result<()> {
    let rom = rom_dump::dump(port, baud)?;
    fs::write(output, &rom).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {} ({} bytes)", output.display(), rom.len());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to set up logging")?;

    match &cli.command {
        Command::Generate { config, output } => generate(config.as_deref(), output),
        Command::FwBlock { config, output } => fw_block(config, output),
        Command::Dump { input, fw_block } => dump(input, *fw_block),
        Command::Checksums { input } => checksums(input),
        #[cfg(feature = "dump-rom")]
        Command::DumpRom { port, output, baud } => dump_rom(port, output, *baud),
    }
}
