use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use snc7330_boot::fw_block::{CrcRegion, FirmwareInfoBlock};
use snc7330_boot::load_table::{
    BootSlot, BuildConfig, Checksum, ClockDivider, CodeRegion, FileDevice, FileName,
    FinishAction, IoPolarity, LayoutError, LoadSection, LoadTable, ManualLoad, PllConfig,
    ReadCommand, UsbString,
};

/// A 32-bit value written as a number or as a `0x` hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Word(pub u32);

struct WordVisitor;

impl<'de> Visitor<'de> for WordVisitor {
    type Value = Word;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 32-bit integer or a 0x-prefixed hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Word, E> {
        u32::try_from(v)
            .map(Word)
            .map_err(|_| E::custom(format!("{} does not fit in 32 bits", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Word, E> {
        u32::try_from(v)
            .map(Word)
            .map_err(|_| E::custom(format!("{} does not fit in 32 bits", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Word, E> {
        let s = v.trim().replace('_', "");
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        };
        parsed
            .map(Word)
            .map_err(|_| E::custom(format!("invalid 32-bit value `{}`", v)))
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D>(deserializer: D) -> Result<Word, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(WordVisitor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct RegionConfig {
    pub address: Word,
    pub size: Word,
}

impl From<RegionConfig> for CodeRegion {
    fn from(r: RegionConfig) -> Self {
        CodeRegion::new(r.address.0, r.size.0)
    }
}

fn region(r: Option<RegionConfig>) -> CodeRegion {
    r.map(CodeRegion::from).unwrap_or(CodeRegion::EMPTY)
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadType {
    Read,
    FastRead,
    DualIo,
    QuadIo,
}

impl From<ReadType> for ReadCommand {
    fn from(t: ReadType) -> Self {
        match t {
            ReadType::Read => ReadCommand::Read,
            ReadType::FastRead => ReadCommand::FastRead,
            ReadType::DualIo => ReadCommand::DualIoRead,
            ReadType::QuadIo => ReadCommand::QuadIoRead,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FlashSettings {
    /// SPI flash clock divider exponent (`SYS / 2^n`).
    #[serde(default)]
    pub clk_div: Option<u8>,
    #[serde(default)]
    pub read_type: Option<ReadType>,
    #[serde(default)]
    pub quad_en_bit: Option<u8>,
    #[serde(default)]
    pub stay_quad_mode: bool,
    /// Status register value written before loading.
    #[serde(default)]
    pub status_reg: Option<Word>,
    #[serde(default)]
    pub manual_table_addr: Option<Word>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PllSettings {
    pub integer: u8,
    #[serde(default)]
    pub fraction: Word,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finish {
    Pending,
    Reset,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    None,
    ActiveHigh,
    ActiveLow,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EncrypterSettings {
    #[serde(default)]
    pub finish: Option<Finish>,
    #[serde(default)]
    pub io_processing: Option<u8>,
    #[serde(default)]
    pub io_ok: Option<u8>,
    #[serde(default)]
    pub io_fail: Option<u8>,
    #[serde(default)]
    pub io_active: Option<Polarity>,
    #[serde(default)]
    pub dpd: Option<RegionConfig>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "device", rename_all = "snake_case")]
pub enum BootSlotConfig {
    Flash { address: Word },
    Sdc0 { offset: Word, name: String },
    Sdc1 { offset: Word, name: String },
    Nand { offset: Word, name: String },
    SpiNand { offset: Word, name: String },
}

impl BootSlotConfig {
    fn to_slot(&self) -> Result<BootSlot> {
        let (device, offset, name) = match self {
            BootSlotConfig::Flash { address } => {
                return Ok(BootSlot::Flash { address: address.0 })
            }
            BootSlotConfig::Sdc0 { offset, name } => (FileDevice::Sdc0, offset, name),
            BootSlotConfig::Sdc1 { offset, name } => (FileDevice::Sdc1, offset, name),
            BootSlotConfig::Nand { offset, name } => (FileDevice::Nand, offset, name),
            BootSlotConfig::SpiNand { offset, name } => (FileDevice::SpiNand, offset, name),
        };
        let name = FileName::try_new(name).ok_or_else(|| {
            layout(LayoutError::StringTooLong {
                field: "boot file name",
                max: 24,
            })
        })?;
        Ok(BootSlot::File {
            device,
            offset: offset.0,
            name,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SectionConfig {
    pub destination: Word,
    pub source: Word,
    pub size: Word,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UsbSettings {
    #[serde(default)]
    pub vid: Option<Word>,
    #[serde(default)]
    pub pid: Option<Word>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// Contents of a load table config file. Anything left out keeps the reference setting.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub flash_size: Option<Word>,
    #[serde(default)]
    pub load_table_address: Option<Word>,
    #[serde(default)]
    pub pram: Option<RegionConfig>,
    #[serde(default)]
    pub sram: Option<RegionConfig>,
    #[serde(default)]
    pub core1: Option<RegionConfig>,
    #[serde(default)]
    pub ext: Option<RegionConfig>,

    #[serde(default)]
    pub check_boot_code: bool,
    #[serde(default)]
    pub check_load_table: bool,
    #[serde(default)]
    pub use_ext_clk: bool,
    #[serde(default)]
    pub sys_clk_mhz: Option<u8>,
    #[serde(default)]
    pub pll: Option<PllSettings>,
    #[serde(default)]
    pub flash: Option<FlashSettings>,
    #[serde(default)]
    pub encrypter: Option<EncrypterSettings>,
    #[serde(default)]
    pub aes_key: Option<Vec<Word>>,

    /// Enables the multi-boot priority check when non-empty.
    #[serde(default)]
    pub boot_priority: Vec<BootSlotConfig>,
    #[serde(default)]
    pub manual_load: Vec<SectionConfig>,

    #[serde(default)]
    pub loader_mark: Option<String>,
    #[serde(default)]
    pub fw_info_blocks: Vec<Word>,
    #[serde(default)]
    pub usb: Option<UsbSettings>,
    #[serde(default)]
    pub data: Vec<RegionConfig>,
}

fn layout(e: LayoutError) -> anyhow::Error {
    anyhow!("{}", e)
}

fn usb_string(s: &Option<String>, field: &'static str, default: UsbString) -> Result<UsbString> {
    match s {
        Some(s) => UsbString::try_new(s)
            .ok_or_else(|| layout(LayoutError::StringTooLong { field, max: 48 })),
        None => Ok(default),
    }
}

fn u16_word(w: Word, field: &str) -> Result<u16> {
    u16::try_from(w.0).with_context(|| format!("{} 0x{:X} does not fit in 16 bits", field, w.0))
}

fn clock_divider(n: u8) -> Result<ClockDivider> {
    Ok(match n {
        0 => ClockDivider::Div1,
        1 => ClockDivider::Div2,
        2 => ClockDivider::Div4,
        3 => ClockDivider::Div8,
        _ => bail!("clk_div {} out of range 0..=3", n),
    })
}

impl TableConfig {
    pub fn from_hjson(text: &str) -> Result<Self> {
        serde_hjson::from_str(text).context("Failed to parse load table config")
    }

    pub fn build_config(&self) -> BuildConfig {
        let default = BuildConfig::DEFAULT;
        BuildConfig {
            flash_size: self.flash_size.map_or(default.flash_size, |w| w.0),
            load_table_address: self
                .load_table_address
                .map_or(default.load_table_address, |w| w.0),
            pram: self.pram.map_or(default.pram, CodeRegion::from),
            sram: region(self.sram),
            core1: region(self.core1),
            ext: region(self.ext),
            encrypted: self.encrypted,
        }
    }

    /// Build the table and check it.
    pub fn to_table(&self) -> Result<LoadTable> {
        let mut table = LoadTable::new(&self.build_config());
        let rom = &mut table.rom;

        rom.load_cfg = rom
            .load_cfg
            .with_check_boot_code(self.check_boot_code)
            .with_check_load_table(self.check_load_table)
            .with_use_ext_clk(self.use_ext_clk);
        if let Some(mhz) = self.sys_clk_mhz {
            rom.load_cfg = rom.load_cfg.with_sys_clk_mhz(mhz);
        }
        if let Some(pll) = &self.pll {
            if pll.integer > 0x3F || pll.fraction.0 > 0xF_FFFF {
                bail!("PLL integer must fit 6 bits and fraction 20 bits");
            }
            rom.pll = PllConfig::new()
                .with_integer(pll.integer)
                .with_fraction(pll.fraction.0);
        }

        if let Some(flash) = &self.flash {
            let mut clock = rom.flash.clock;
            if let Some(div) = flash.clk_div {
                clock = clock.with_clk_div(clock_divider(div)?);
            }
            if let Some(t) = &flash.read_type {
                clock = clock.with_read_type(t.clone().into());
            }
            if let Some(bit) = flash.quad_en_bit {
                if bit > 7 {
                    bail!("quad_en_bit {} out of range 0..=7", bit);
                }
                clock = clock.with_quad_en_bit(bit);
            }
            clock = clock.with_stay_quad_mode(flash.stay_quad_mode);
            if let Some(status) = flash.status_reg {
                clock = clock.with_init_status_reg(true);
                rom.flash.status_reg = status.0;
            }
            rom.flash.clock = clock;
            if let Some(addr) = flash.manual_table_addr {
                rom.flash.manual_table_addr = addr.0;
            }
        }

        if let Some(key) = &self.aes_key {
            if key.len() != 8 {
                bail!("aes_key needs 8 words, got {}", key.len());
            }
            for (dst, src) in rom.aes_key.iter_mut().zip(key) {
                *dst = src.0;
            }
        }

        if let Some(settings) = &self.encrypter {
            match rom.encrypter.as_mut() {
                Some(enc) => {
                    if let Some(finish) = &settings.finish {
                        enc.finish = match finish {
                            Finish::Pending => FinishAction::Pending,
                            Finish::Reset => FinishAction::Reset,
                        };
                    }
                    enc.io_processing = settings.io_processing;
                    enc.io_ok = settings.io_ok;
                    enc.io_fail = settings.io_fail;
                    if let Some(polarity) = &settings.io_active {
                        enc.io_active = match polarity {
                            Polarity::None => IoPolarity::None,
                            Polarity::ActiveHigh => IoPolarity::ActiveHigh,
                            Polarity::ActiveLow => IoPolarity::ActiveLow,
                        };
                    }
                    enc.dpd_code = region(settings.dpd);
                }
                None => log::warn!("`encrypter` settings ignored, `encrypted` is false"),
            }
        }

        if self.boot_priority.len() > rom.boot_priority.len() {
            bail!(
                "{} boot priority slots, at most {}",
                self.boot_priority.len(),
                rom.boot_priority.len()
            );
        }
        for (i, slot) in self.boot_priority.iter().enumerate() {
            rom.boot_priority[i] = slot
                .to_slot()
                .with_context(|| format!("boot_priority[{}]", i))?;
        }
        if !self.boot_priority.is_empty() {
            rom.load_cfg = rom
                .load_cfg
                .with_multiboot_mask(snc7330_boot::load_table::LoadConfig::MULTIBOOT_ENABLE);
        }

        if !self.manual_load.is_empty() {
            let sections: Vec<LoadSection> = self
                .manual_load
                .iter()
                .map(|s| LoadSection::new(s.destination.0, s.source.0, s.size.0))
                .collect();
            let list = ManualLoad::try_new(&sections).ok_or_else(|| {
                layout(LayoutError::ManualLoadCount {
                    count: sections.len(),
                })
            })?;
            rom.manual_load = Some(list);
        }

        if let Some(mark) = &self.loader_mark {
            let bytes = mark.as_bytes();
            if bytes.len() > 8 {
                bail!("loader_mark `{}` is longer than 8 bytes", mark);
            }
            table.loader.mark[..bytes.len()].copy_from_slice(bytes);
        }
        if self.fw_info_blocks.len() > table.loader.fw_info.len() {
            bail!(
                "{} firmware info blocks, at most {}",
                self.fw_info_blocks.len(),
                table.loader.fw_info.len()
            );
        }
        for (dst, src) in table.loader.fw_info.iter_mut().zip(&self.fw_info_blocks) {
            *dst = src.0;
        }

        if let Some(usb) = &self.usb {
            if let Some(vid) = usb.vid {
                table.usb.vid = u16_word(vid, "usb.vid")?;
            }
            if let Some(pid) = usb.pid {
                table.usb.pid = u16_word(pid, "usb.pid")?;
            }
            table.usb.manufacturer =
                usb_string(&usb.manufacturer, "usb.manufacturer", table.usb.manufacturer)?;
            table.usb.product = usb_string(&usb.product, "usb.product", table.usb.product)?;
            table.usb.serial_number =
                usb_string(&usb.serial_number, "usb.serial_number", table.usb.serial_number)?;
        }

        let data: Vec<CodeRegion> = self.data.iter().copied().map(CodeRegion::from).collect();
        table.fw_info = table.fw_info.try_with_data(&data).map_err(layout)?;

        table.check().map_err(layout)?;
        Ok(table)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct CrcRegionConfig {
    pub destination: Word,
    pub source: Word,
    pub size: Word,
}

/// Contents of a firmware info block config file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BlockConfig {
    #[serde(default)]
    pub mark: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub base_fw: Word,
    #[serde(default)]
    pub status_update: Word,
    #[serde(default)]
    pub check_crc: bool,
    #[serde(default)]
    pub regions: Vec<CrcRegionConfig>,
}

fn fixed8(s: &Option<String>, field: &str) -> Result<[u8; 8]> {
    let mut out = [0u8; 8];
    if let Some(s) = s {
        let bytes = s.as_bytes();
        if bytes.len() > 8 {
            bail!("{} `{}` is longer than 8 bytes", field, s);
        }
        out[..bytes.len()].copy_from_slice(bytes);
    }
    Ok(out)
}

impl BlockConfig {
    pub fn from_hjson(text: &str) -> Result<Self> {
        serde_hjson::from_str(text).context("Failed to parse firmware info block config")
    }

    pub fn to_block(&self) -> Result<FirmwareInfoBlock> {
        let mut block = FirmwareInfoBlock::new(self.base_fw.0);
        block.mark = fixed8(&self.mark, "mark")?;
        block.version = fixed8(&self.version, "version")?;
        block.status_update = self.status_update.0;
        block.check_crc = self.check_crc;
        if self.regions.len() > FirmwareInfoBlock::MAX_REGIONS {
            bail!(
                "{} CRC regions, at most {}",
                self.regions.len(),
                FirmwareInfoBlock::MAX_REGIONS
            );
        }
        for (dst, src) in block.regions.iter_mut().zip(&self.regions) {
            *dst = CrcRegion {
                destination: src.destination.0,
                source: src.source.0,
                size: src.size.0,
                crc: Checksum::Pending,
            };
        }
        Ok(block)
    }
}
