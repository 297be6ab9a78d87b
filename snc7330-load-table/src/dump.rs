use std::fmt::{self, Write};

use snc7330_boot::fw_block::FirmwareInfoBlock;
use snc7330_boot::load_table::{
    reserved_is_zero, BootSlot, CodeRegion, LoadTable, MARK, TABLE_SIZE,
};

fn region(r: &CodeRegion) -> String {
    format!("0x{:08X} + 0x{:X}", r.address, r.size)
}

fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Human readable listing of a load table.
pub fn table(f: &mut impl Write, t: &LoadTable, image: &[u8; TABLE_SIZE]) -> fmt::Result {
    let rom = &t.rom;
    let cfg = rom.load_cfg;

    writeln!(f, "ROM boot config")?;
    writeln!(f, "  mark               {}", text(&MARK))?;
    writeln!(f, "  load_cfg           0x{:08X}", cfg.into_bits())?;
    writeln!(f, "    encrypted_boot   {}", cfg.encrypted_boot_code())?;
    writeln!(f, "    check_boot_code  {}", cfg.check_boot_code())?;
    writeln!(f, "    check_load_table {}", cfg.check_load_table())?;
    writeln!(f, "    no_sys_reset     {}", cfg.no_sys_reset())?;
    writeln!(f, "    pll_speedup      {}", cfg.use_pll_speedup())?;
    writeln!(f, "    ext_clk          {}", cfg.use_ext_clk())?;
    writeln!(f, "    sys_clk_mhz      {}", cfg.sys_clk_mhz())?;
    writeln!(f, "    multiboot_mask   0x{:03X}", cfg.multiboot_mask())?;
    writeln!(f, "  user_code          {}", region(&rom.user_code))?;
    writeln!(
        f,
        "  pll                integer {} fraction 0x{:05X}",
        rom.pll.integer(),
        rom.pll.fraction()
    )?;
    writeln!(f, "  crc                {:?}", rom.crc)?;
    writeln!(
        f,
        "  flash              {:?} {:?} quad_en_bit {} status 0x{:08X} manual_table 0x{:08X}",
        rom.flash.clock.clk_div(),
        rom.flash.clock.read_type(),
        rom.flash.clock.quad_en_bit(),
        rom.flash.status_reg,
        rom.flash.manual_table_addr
    )?;
    writeln!(
        f,
        "  sd/nand            0x{:08X} spi 0x{:08X}",
        rom.sd_nand.clock.into_bits(),
        rom.sd_nand.spi.into_bits()
    )?;

    match &rom.encrypter {
        Some(enc) => {
            let state = if enc.marked { "" } else { " (unmarked, ignored by the ROM)" };
            writeln!(f, "  encrypter{}", state)?;
            writeln!(f, "    sram_code        {}", region(&enc.sram_code))?;
            writeln!(f, "    dpd_code         {}", region(&enc.dpd_code))?;
            writeln!(f, "    finish           {:?}", enc.finish)?;
            writeln!(
                f,
                "    io               processing {:?} ok {:?} fail {:?} {:?}",
                enc.io_processing, enc.io_ok, enc.io_fail, enc.io_active
            )?;
        }
        None => {
            writeln!(f, "  encrypter          none")?;
        }
    }

    for (i, slot) in rom.boot_priority.iter().enumerate() {
        match slot {
            BootSlot::Empty => {}
            BootSlot::Flash { address } => {
                writeln!(f, "  boot[{}]            flash 0x{:08X}", i, address)?;
            }
            BootSlot::File {
                device,
                offset,
                name,
            } => {
                writeln!(
                    f,
                    "  boot[{}]            {:?} offset 0x{:X} {:?}",
                    i, device, offset, name
                )?;
            }
        }
    }

    if let Some(list) = &rom.manual_load {
        for (i, s) in list.sections().iter().enumerate() {
            writeln!(
                f,
                "  manual_load[{}]     0x{:08X} <- 0x{:08X} size 0x{:X} crc {:?}",
                i, s.destination, s.source, s.size, s.crc
            )?;
        }
    }

    writeln!(
        f,
        "  info               version 0x{:08X} @ 0x{:08X} table 0x{:08X} checksum {:?}",
        rom.info.boot_code_version,
        rom.info.boot_code_version_addr,
        rom.info.table_version,
        rom.info.table_checksum
    )?;

    writeln!(f, "Loader config")?;
    if t.loader.is_empty() {
        writeln!(f, "  empty")?;
    } else {
        writeln!(f, "  mark               {}", text(&t.loader.mark))?;
        for addr in t.loader.blocks() {
            writeln!(f, "  fw_info            0x{:08X}", addr)?;
        }
    }

    writeln!(f, "USB platform info")?;
    writeln!(f, "  vid:pid            {:04X}:{:04X}", t.usb.vid, t.usb.pid)?;
    writeln!(f, "  manufacturer       {:?}", t.usb.manufacturer)?;
    writeln!(f, "  product            {:?}", t.usb.product)?;
    writeln!(f, "  serial_number      {:?}", t.usb.serial_number)?;

    let fw = &t.fw_info;
    writeln!(f, "Firmware info")?;
    writeln!(f, "  pram               {}", region(&fw.pram))?;
    writeln!(f, "  sram               {}", region(&fw.sram))?;
    writeln!(f, "  core1              {}", region(&fw.core1))?;
    writeln!(f, "  ext                {}", region(&fw.ext))?;
    writeln!(f, "  flash_size         0x{:X}", fw.flash_size)?;
    writeln!(f, "  load_table         0x{:08X}", fw.load_table_address)?;
    for (i, r) in fw.data_regions().enumerate() {
        writeln!(f, "  data[{}]            {}", i, region(r))?;
    }

    if !reserved_is_zero(image) {
        writeln!(f, "warning: reserved ranges are not zero")?;
    }
    Ok(())
}

/// Human readable listing of a firmware info block.
pub fn block(f: &mut impl Write, b: &FirmwareInfoBlock) -> fmt::Result {
    writeln!(f, "Firmware info block")?;
    writeln!(f, "  mark               {}", text(&b.mark))?;
    writeln!(f, "  version            {}", text(&b.version))?;
    writeln!(f, "  base_fw            0x{:08X}", b.base_fw)?;
    writeln!(f, "  status_update      0x{:08X}", b.status_update)?;
    writeln!(f, "  check_crc          {} crc {:?}", b.check_crc, b.crc)?;
    for (i, r) in b.regions.iter().enumerate().filter(|(_, r)| r.size != 0) {
        writeln!(
            f,
            "  region[{}]          0x{:08X} <- 0x{:08X} size 0x{:X} crc {:?}",
            i, r.destination, r.source, r.size, r.crc
        )?;
    }
    Ok(())
}
