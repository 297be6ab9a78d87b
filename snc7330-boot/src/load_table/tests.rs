use super::*;

const PLAIN: BuildConfig = BuildConfig {
    encrypted: false,
    ..BuildConfig::DEFAULT
};

const ENCRYPTED: BuildConfig = BuildConfig {
    encrypted: true,
    sram: CodeRegion::new(0x6001_1000, 0x8000),
    ..BuildConfig::DEFAULT
};

// Encoded at compile time, the same way `load_table!` does it.
const PLAIN_IMAGE: [u8; TABLE_SIZE] = LoadTable::new(&PLAIN).encode();

fn u32_at(image: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(image[offset..offset + 4].try_into().unwrap())
}

fn encrypted_image() -> [u8; TABLE_SIZE] {
    LoadTable::new(&ENCRYPTED).try_encode().unwrap()
}

#[test]
fn mark_and_revision() {
    assert_eq!(&PLAIN_IMAGE[..8], b"SONIXDEV");
    assert_eq!(&encrypted_image()[..8], b"SONIXDEV");
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x1F8), 0x5A5A_0033);
}

#[test]
fn reference_settings() {
    // USE_PLL_SPEEDUP | NO_SYS_RESET
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x08), 0x18);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x10), 0x6000_1000);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x14), 0x1_0000);
    // CLK_DIV = 2, READ_TYPE = 1
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x60), 0x6);
    // SD1_SPEED = 2
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x70), 0x4_0000);
}

#[test]
fn load_config_bit_positions() {
    let cfg = LoadConfig::new()
        .with_encrypted_boot_code(true)
        .with_use_ext_clk(true)
        .with_sys_clk_mhz(162)
        .with_multiboot_mask(LoadConfig::MULTIBOOT_ENABLE);
    assert_eq!(cfg.into_bits(), 0x0FFF_A221);

    let pll = PllConfig::new().with_integer(0x3F).with_fraction(0xF_FFFF);
    assert_eq!(pll.into_bits(), 0x0FFF_FF3F);
}

#[test]
fn plain_table_has_no_encrypter() {
    assert!(PLAIN_IMAGE[0x80..0xC0].iter().all(|&b| b == 0));
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x08) & 1, 0);
}

#[test]
fn encrypted_table_has_encrypter() {
    let image = encrypted_image();

    assert_eq!(&image[0x80..0x84], b"EN__");
    assert_eq!(u32_at(&image, 0x84), CHECKSUM_PENDING);
    assert_eq!(u32_at(&image, 0x88), CHECKSUM_PENDING);
    // Reset on finish, no indicator pins (99), active high.
    assert_eq!(u32_at(&image, 0x8C), 0x058D_8D8D);
    assert_eq!(u32_at(&image, 0x90), 0x6001_1000);
    assert_eq!(u32_at(&image, 0x94), 0x8000);
    assert_eq!(u32_at(&image, 0x08) & 1, 1);
    assert!(image[0xA0..0xC0].iter().all(|&b| b == 0));
}

#[test]
fn checksums_start_pending() {
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x24), CHECKSUM_PENDING);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x1FC), CHECKSUM_PENDING);

    let table = LoadTable::new(&PLAIN);
    let fields: Vec<_> = table.checksum_fields().collect();
    assert_eq!(fields.len(), 2);
    for field in &fields {
        assert!(field.value.is_pending());
        assert_eq!(u32_at(&PLAIN_IMAGE, field.offset), CHECKSUM_PENDING);
    }
}

#[test]
fn checksum_fields_follow_optional_records() {
    let mut table = LoadTable::new(&ENCRYPTED);
    table.rom.manual_load = Some(ManualLoad::new(&[
        LoadSection::new(0x1800_0000, 0x6002_0000, 0x400),
        LoadSection::new(0x1800_1000, 0x6002_1000, 0x400),
    ]));
    let image = table.try_encode().unwrap();

    let fields: Vec<_> = table.checksum_fields().collect();
    let kinds: Vec<_> = fields.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        [
            ChecksumKind::UserCode,
            ChecksumKind::Table,
            ChecksumKind::EncrypterExt,
            ChecksumKind::EncrypterDpd,
            ChecksumKind::ManualSection(0),
            ChecksumKind::ManualSection(1),
        ]
    );
    assert_eq!(fields[4].offset, 0x150);
    assert_eq!(fields[5].offset, 0x160);
    for field in &fields {
        assert_eq!(u32_at(&image, field.offset), CHECKSUM_PENDING);
    }
}

#[test]
fn reserved_ranges_are_zero() {
    assert!(reserved_is_zero(&PLAIN_IMAGE));
    assert!(reserved_is_zero(&encrypted_image()));
    // Loader config is unused by default.
    assert!(PLAIN_IMAGE[0x200..0x400].iter().all(|&b| b == 0));
}

#[test]
fn usb_platform_info() {
    assert_eq!(&PLAIN_IMAGE[0x600..0x604], &[0x45, 0x0C, 0x00, 0x73]);
    let name = b"Sonix Technology Co., Ltd.";
    assert_eq!(&PLAIN_IMAGE[0x604..0x604 + name.len()], name);
    assert!(PLAIN_IMAGE[0x604 + name.len()..0x700].iter().all(|&b| b == 0));
}

#[test]
fn firmware_info() {
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x800), 0x6000_1000);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x804), 0x1_0000);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x820), 0x0100_0000);
    assert_eq!(u32_at(&PLAIN_IMAGE, 0x824), 0x6000_0000);
    assert!(PLAIN_IMAGE[0x828..0x900].iter().all(|&b| b == 0));
}

#[test]
fn data_regions_fill_from_the_start() {
    let data = [CodeRegion::new(0x6008_0000, 0x100), CodeRegion::new(0x6009_0000, 0x200)];
    let mut table = LoadTable::new(&PLAIN);
    table.fw_info = table.fw_info.with_data(&data);
    let image = table.try_encode().unwrap();

    assert_eq!(u32_at(&image, 0x828), 0x6008_0000);
    assert_eq!(u32_at(&image, 0x82C), 0x100);
    assert_eq!(u32_at(&image, 0x830), 0x6009_0000);
    assert_eq!(u32_at(&image, 0x834), 0x200);
    assert!(image[0x838..0x900].iter().all(|&b| b == 0));
    assert_eq!(table.fw_info.data_regions().count(), 2);

    let last = FirmwareInfo::EMPTY
        .with_data(&[CodeRegion::new(0x6100_0000, 4); FirmwareInfo::MAX_DATA]);
    let mut w = Writer::<TABLE_SIZE>::new();
    last.encode(&mut w, FW_INFO.start);
    let image = w.finish();
    assert_eq!(u32_at(&image, 0x8F8), 0x6100_0000);
    assert_eq!(u32_at(&image, 0x8FC), 4);
}

#[test]
fn too_many_data_regions() {
    let data = [CodeRegion::new(0x6100_0000, 4); FirmwareInfo::MAX_DATA + 1];
    assert_eq!(
        FirmwareInfo::EMPTY.try_with_data(&data),
        Err(LayoutError::TooManyDataRegions { count: 28 })
    );
}

#[test]
fn boot_priority_overlay() {
    let mut table = LoadTable::new(&PLAIN);
    table.rom.load_cfg = table
        .rom
        .load_cfg
        .with_multiboot_mask(LoadConfig::MULTIBOOT_ENABLE);
    table.rom.boot_priority = [
        BootSlot::File {
            device: FileDevice::Sdc0,
            offset: 0x200,
            name: FileName::new("BOOT.BIN"),
        },
        BootSlot::Flash {
            address: 0x6010_0000,
        },
        BootSlot::Empty,
        BootSlot::Empty,
    ];
    let image = table.try_encode().unwrap();

    assert_eq!(u32_at(&image, 0xC0), device::SDC0);
    assert_eq!(u32_at(&image, 0xC4), 0x200);
    assert_eq!(&image[0xC8..0xD0], b"BOOT.BIN");
    assert!(image[0xD0..0xE0].iter().all(|&b| b == 0));

    assert_eq!(u32_at(&image, 0xE0), device::FLASH);
    assert_eq!(u32_at(&image, 0xE4), 0x6010_0000);
    assert!(image[0xE8..0x100].iter().all(|&b| b == 0));

    assert!(image[0x100..0x140].iter().all(|&b| b == 0));
}

#[test]
fn manual_load_unused_sections_are_zero() {
    let mut table = LoadTable::new(&PLAIN);
    table.rom.manual_load = Some(ManualLoad::new(&[LoadSection {
        destination: 0x1800_0000,
        source: 0x6002_0000,
        size: 0x800,
        crc: Checksum::Value(0x1234_5678),
    }]));
    let image = table.try_encode().unwrap();

    assert_eq!(u32_at(&image, 0x140), 1);
    assert_eq!(u32_at(&image, 0x144), 0x1800_0000);
    assert_eq!(u32_at(&image, 0x148), 0x6002_0000);
    assert_eq!(u32_at(&image, 0x14C), 0x800);
    assert_eq!(u32_at(&image, 0x150), 0x1234_5678);
    assert!(image[0x154..0x1F0].iter().all(|&b| b == 0));
}

#[test]
fn manual_load_count_bounds() {
    assert!(ManualLoad::try_new(&[]).is_none());
    assert!(ManualLoad::try_new(&[LoadSection::EMPTY; 11]).is_none());
    assert_eq!(
        ManualLoad::try_new(&[LoadSection::EMPTY; 10]).map(|l| l.count()),
        Some(10)
    );
}

#[test]
fn rejects_user_code_over_table() {
    let config = BuildConfig {
        pram: CodeRegion::new(0x6000_0800, 0x1000),
        ..PLAIN
    };
    assert_eq!(
        LoadTable::new(&config).try_encode(),
        Err(LayoutError::UserCodeOutsideFlash {
            address: 0x6000_0800,
            size: 0x1000
        })
    );

    let config = BuildConfig {
        pram: CodeRegion::new(0x60FF_0000, 0x2_0000),
        ..PLAIN
    };
    assert!(matches!(
        LoadTable::new(&config).check(),
        Err(LayoutError::UserCodeOutsideFlash { .. })
    ));
}

#[test]
fn rejects_bad_encrypter() {
    let mut table = LoadTable::new(&ENCRYPTED);
    if let Some(enc) = table.rom.encrypter.as_mut() {
        enc.io_ok = Some(40);
    }
    assert_eq!(table.check(), Err(LayoutError::InvalidPin { pin: 40 }));

    let config = BuildConfig {
        sram: CodeRegion::new(0x6001_1800, 0x1000),
        ..ENCRYPTED
    };
    assert!(matches!(
        LoadTable::new(&config).check(),
        Err(LayoutError::EncryptedCodeRegion { .. })
    ));

    let config = BuildConfig {
        sram: CodeRegion::new(0x6001_1000, 0x1_9000),
        ..ENCRYPTED
    };
    assert!(matches!(
        LoadTable::new(&config).check(),
        Err(LayoutError::EncryptedCodeRegion { .. })
    ));
}

#[test]
fn decode_restores_table() {
    let mut table = LoadTable::new(&ENCRYPTED);
    table.rom.boot_priority[0] = BootSlot::File {
        device: FileDevice::SpiNand,
        offset: 0x4_0000,
        name: FileName::new("FW.BIN"),
    };
    table.rom.boot_priority[1] = BootSlot::Flash {
        address: 0x6008_0000,
    };
    table.rom.manual_load = Some(ManualLoad::new(&[LoadSection::new(
        0x1800_0000,
        0x6002_0000,
        0x400,
    )]));
    if let Some(enc) = table.rom.encrypter.as_mut() {
        enc.io_fail = Some(36);
        enc.io_active = IoPolarity::ActiveLow;
    }
    table.loader.fw_info[0] = 0x6004_0000;
    table.usb.product = UsbString::new("SNC7330 EVB");
    let image = table.try_encode().unwrap();

    let decoded = LoadTable::decode(&image).unwrap();
    assert_eq!(decoded, table);
    assert_eq!(decoded.usb.product.as_str(), Some("SNC7330 EVB"));
    assert_eq!(decoded.loader.blocks().collect::<Vec<_>>(), [0x6004_0000]);
}

#[test]
fn decode_keeps_unmarked_encrypter() {
    // Encrypter settings filled in, tag left out: the ROM skips AES.
    let mut image = PLAIN_IMAGE;
    image[0x84..0x88].copy_from_slice(&CHECKSUM_PENDING.to_le_bytes());
    image[0x8C..0x90].copy_from_slice(&0x058D_8D8Du32.to_le_bytes());
    image[0x90..0x94].copy_from_slice(&0x6001_1000u32.to_le_bytes());
    image[0x94..0x98].copy_from_slice(&0x8000u32.to_le_bytes());

    let table = LoadTable::decode(&image).unwrap();
    let enc = table.rom.encrypter.unwrap();
    assert!(!enc.marked);
    assert_eq!(enc.crc_ext, Checksum::Pending);
    assert_eq!(enc.crc_dpd, Checksum::Value(0));
    assert_eq!(enc.finish, FinishAction::Reset);
    assert_eq!(enc.io_ok, None);
    assert_eq!(enc.sram_code, CodeRegion::new(0x6001_1000, 0x8000));

    assert_eq!(table.try_encode().unwrap(), image);
    assert!(table
        .checksum_fields()
        .any(|f| f.kind == ChecksumKind::EncrypterExt && f.offset == 0x84));
}

#[test]
fn decode_keeps_raw_pins() {
    let mut image = encrypted_image();
    image[0x8C..0x90].copy_from_slice(&0x0525_8D8Du32.to_le_bytes());

    let table = LoadTable::decode(&image).unwrap();
    let enc = table.rom.encrypter.unwrap();
    assert_eq!(enc.io_processing, None);
    assert_eq!(enc.io_ok, None);
    assert_eq!(enc.io_fail, Some(0x49));
    assert_eq!(
        table.try_encode(),
        Err(LayoutError::InvalidPin { pin: 0x49 })
    );

    let mut unmarked = table;
    if let Some(enc) = unmarked.rom.encrypter.as_mut() {
        enc.marked = false;
    }
    let reencoded = unmarked.try_encode().unwrap();
    assert_eq!(&reencoded[0x80..0x84], &[0; 4]);
    assert_eq!(reencoded[0x84..0xC0], image[0x84..0xC0]);
}

#[test]
fn decode_rejects_malformed_input() {
    assert_eq!(
        LoadTable::decode(&PLAIN_IMAGE[..0x200]),
        Err(DecodeError::Length { len: 0x200 })
    );

    let mut image = PLAIN_IMAGE;
    image[..8].copy_from_slice(b"SONIXDEW");
    assert_eq!(
        LoadTable::decode(&image),
        Err(DecodeError::Mark {
            found: *b"SONIXDEW"
        })
    );

    let mut image = PLAIN_IMAGE;
    image[0xE0..0xE4].copy_from_slice(&0x20u32.to_le_bytes());
    assert_eq!(
        LoadTable::decode(&image),
        Err(DecodeError::UnknownBootDevice {
            slot: 1,
            device: 0x20
        })
    );

    let mut image = encrypted_image();
    image[0x80..0x84].copy_from_slice(b"EN_X");
    assert_eq!(
        LoadTable::decode(&image),
        Err(DecodeError::InvalidField {
            offset: 0x80,
            value: u32::from_le_bytes(*b"EN_X"),
        })
    );

    let mut image = PLAIN_IMAGE;
    image[0x140..0x144].copy_from_slice(&11u32.to_le_bytes());
    assert_eq!(
        LoadTable::decode(&image),
        Err(DecodeError::ManualLoadCount { count: 11 })
    );
}

#[test]
fn decoded_all_ones_is_pending() {
    assert_eq!(Checksum::from_raw(0xFFFF_FFFF), Checksum::Pending);
    assert_eq!(Checksum::from_raw(0), Checksum::Value(0));
    assert_eq!(Checksum::Pending.raw(), 0xFFFF_FFFF);
}

#[test]
fn regions_cover_the_table() {
    let mut next = 0;
    for (_, range) in REGIONS.iter() {
        assert_eq!(range.start, next);
        next = range.end;
    }
    assert_eq!(next, TABLE_SIZE);
    assert_eq!(PLAIN_IMAGE.len(), 4096);
}

#[test]
fn file_name_limits() {
    assert!(FileName::try_new("ABCDEFGHIJKLMNOPQRSTUVWX").is_some());
    assert!(FileName::try_new("ABCDEFGHIJKLMNOPQRSTUVWXY").is_none());
    assert_eq!(FileName::new("A.BIN").as_str(), Some("A.BIN"));
    assert!(UsbString::try_new(&"x".repeat(49)).is_none());
}
