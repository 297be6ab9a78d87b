//! SNC7330 load table.
//!
//! The mask ROM reads a 4 KiB table at the start of SPI flash (`0x6000_0000`) on every
//! power-on, before it loads the user code:
//!
//! | Range | Record |
//! |---|---|
//! | `0x000..0x200` | [`RomBootConfig`] |
//! | `0x200..0x400` | [`LoaderConfig`] |
//! | `0x400..0x600` | reserved |
//! | `0x600..0x700` | [`UsbPlatformInfo`] |
//! | `0x700..0x800` | reserved |
//! | `0x800..0x900` | [`FirmwareInfo`] |
//! | `0x900..0x1000` | padding |
//!
//! The table is described by [`LoadTable`] and turned into bytes by [`LoadTable::encode`],
//! which runs at compile time so a bad layout fails the build. Checksum fields are left as
//! [`Checksum::Pending`] and filled in by the flashing tool, see [`ChecksumField`].

// `bitfield-struct` const setters and the const encoders below must keep `core::panic!`,
// see `wdt.rs`.
#[allow(unused_macros)]
macro_rules! panic {
    ($($x:tt)*) => {
        ::core::panic!($($x)*)
    };
}

pub(crate) mod codec;
mod fw_info;
mod loader;
mod rom;
mod usb;

use core::ops::Range;

use codec::{Reader, Writer};

pub use fw_info::FirmwareInfo;
pub use loader::LoaderConfig;
pub use rom::{
    device, offset as rom_offset, BootSlot, ClockDivider, Encrypter, EncrypterControl,
    FileDevice, FileName, FinishAction, FlashClock, FlashConfig, IoPolarity, LoadConfig,
    LoadSection, ManualLoad, PllConfig, ReadCommand, RomBootConfig, SdNandClock, SdNandConfig,
    SpiClock, TableInfo, MARK, TABLE_VERSION,
};
pub use usb::{UsbPlatformInfo, UsbString};

/// Total table size.
pub const TABLE_SIZE: usize = 0x1000;

pub const ROM_CONFIG: Range<usize> = 0x000..0x200;
pub const LOADER_CONFIG: Range<usize> = 0x200..0x400;
pub const RESERVED_400: Range<usize> = 0x400..0x600;
pub const USB_INFO: Range<usize> = 0x600..0x700;
pub const RESERVED_700: Range<usize> = 0x700..0x800;
pub const FW_INFO: Range<usize> = 0x800..0x900;
pub const PADDING: Range<usize> = 0x900..TABLE_SIZE;

/// Every region in address order.
pub const REGIONS: [(&str, Range<usize>); 7] = [
    ("rom_config", ROM_CONFIG),
    ("loader_config", LOADER_CONFIG),
    ("reserved", RESERVED_400),
    ("usb_info", USB_INFO),
    ("reserved", RESERVED_700),
    ("fw_info", FW_INFO),
    ("padding", PADDING),
];

const _: () = {
    let mut i = 0;
    while i < REGIONS.len() {
        let r = &REGIONS[i].1;
        ::core::assert!(r.start < r.end);
        if i + 1 < REGIONS.len() {
            ::core::assert!(r.end <= REGIONS[i + 1].1.start);
        }
        i += 1;
    }
    ::core::assert!(REGIONS[0].1.start == 0);
    ::core::assert!(REGIONS[REGIONS.len() - 1].1.end == TABLE_SIZE);

    ::core::assert!(ROM_CONFIG.end - ROM_CONFIG.start == RomBootConfig::SIZE);
    ::core::assert!(LOADER_CONFIG.end - LOADER_CONFIG.start == LoaderConfig::SIZE);
    ::core::assert!(USB_INFO.end - USB_INFO.start == UsbPlatformInfo::SIZE);
    ::core::assert!(FW_INFO.end - FW_INFO.start == FirmwareInfo::SIZE);
    ::core::assert!(0x28 + 8 * FirmwareInfo::MAX_DATA == FirmwareInfo::SIZE);

    ::core::assert!(rom_offset::ENCRYPTER + rom::size::ENCRYPTER == rom_offset::BOOT_PRIORITY);
    ::core::assert!(
        rom_offset::BOOT_PRIORITY + rom::size::BOOT_PRIORITY == rom_offset::MANUAL_LOAD
    );
    ::core::assert!(
        4 + ManualLoad::MAX_SECTIONS * rom::size::LOAD_SECTION <= rom::size::MANUAL_LOAD
    );
    ::core::assert!(rom_offset::MANUAL_LOAD + rom::size::MANUAL_LOAD == rom_offset::INFO);
    ::core::assert!(rom_offset::INFO + rom::size::INFO == RomBootConfig::SIZE);
};

/// Raw value of a checksum field the flashing tool has not filled in yet.
pub const CHECKSUM_PENDING: u32 = 0xFFFF_FFFF;

/// A CRC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Checksum {
    /// Placeholder, computed after the build.
    Pending,
    Value(u32),
}

impl Checksum {
    pub const fn raw(self) -> u32 {
        match self {
            Checksum::Pending => CHECKSUM_PENDING,
            Checksum::Value(v) => v,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            CHECKSUM_PENDING => Checksum::Pending,
            v => Checksum::Value(v),
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Checksum::Pending)
    }
}

/// Address and size of a code or data image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodeRegion {
    pub address: u32,
    pub size: u32,
}

impl CodeRegion {
    pub const EMPTY: Self = Self::new(0, 0);

    pub const fn new(address: u32, size: u32) -> Self {
        Self { address, size }
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// One past the last byte, `None` on overflow.
    pub const fn end(&self) -> Option<u32> {
        self.address.checked_add(self.size)
    }

    /// Whether `self` lies inside `window`.
    pub const fn within(&self, window: &CodeRegion) -> bool {
        match (self.end(), window.end()) {
            (Some(end), Some(window_end)) => self.address >= window.address && end <= window_end,
            _ => false,
        }
    }
}

/// Alignment required for the SRAM and DPD code regions of the encrypter.
pub const ENCRYPTED_CODE_ALIGN: u32 = 0x1000;

/// Largest SRAM code region the ROM decrypts.
pub const ENCRYPTED_CODE_MAX: u32 = 0x18000;

/// Build-time addresses and sizes, the inputs of [`LoadTable::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuildConfig {
    pub flash_size: u32,
    pub load_table_address: u32,
    /// Main program, loaded by the ROM into PRAM.
    pub pram: CodeRegion,
    /// Extension code decrypted into SRAM when `encrypted` is set.
    pub sram: CodeRegion,
    pub core1: CodeRegion,
    pub ext: CodeRegion,
    /// Whether the user code is stored AES-encrypted.
    pub encrypted: bool,
}

impl BuildConfig {
    /// 16 MiB SPI flash, table at `0x6000_0000`, 64 KiB of user code right after it.
    ///
    /// `encrypted` follows the `encrypted-boot` feature.
    pub const DEFAULT: Self = Self {
        flash_size: 0x0100_0000,
        load_table_address: 0x6000_0000,
        pram: CodeRegion::new(0x6000_1000, 0x1_0000),
        sram: CodeRegion::EMPTY,
        core1: CodeRegion::EMPTY,
        ext: CodeRegion::EMPTY,
        encrypted: cfg!(feature = "encrypted-boot"),
    };
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A table that the ROM would misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutError {
    /// Manual load section count outside `1..=10`.
    ManualLoadCount { count: usize },
    /// Auxiliary data list longer than 27 entries.
    TooManyDataRegions { count: usize },
    /// Encrypter indicator pin outside `0..=36`.
    InvalidPin { pin: u8 },
    /// Encrypter code region not aligned to 4 KiB or larger than `0x18000`.
    EncryptedCodeRegion { address: u32, size: u32 },
    /// User code does not fit in flash after the load table.
    UserCodeOutsideFlash { address: u32, size: u32 },
    /// String longer than its field.
    StringTooLong { field: &'static str, max: usize },
}

impl LayoutError {
    /// Abort const evaluation with a message naming the error.
    pub const fn panic(self) -> ! {
        match self {
            LayoutError::ManualLoadCount { .. } => panic!("manual load needs 1 to 10 sections"),
            LayoutError::TooManyDataRegions { .. } => {
                panic!("firmware info holds at most 27 data regions")
            }
            LayoutError::InvalidPin { .. } => panic!("encrypter pin must be in 0..=36"),
            LayoutError::EncryptedCodeRegion { .. } => {
                panic!("encrypted code region must be 4 KiB aligned and at most 0x18000 bytes")
            }
            LayoutError::UserCodeOutsideFlash { .. } => {
                panic!("user code must lie in flash after the load table")
            }
            LayoutError::StringTooLong { .. } => panic!("string does not fit its field"),
        }
    }
}

impl core::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            LayoutError::ManualLoadCount { count } => {
                write!(f, "manual load has {} sections, expected 1 to 10", count)
            }
            LayoutError::TooManyDataRegions { count } => {
                write!(f, "{} data regions, at most {} fit", count, FirmwareInfo::MAX_DATA)
            }
            LayoutError::InvalidPin { pin } => {
                write!(f, "encrypter pin {} out of range 0..={}", pin, Encrypter::IO_MAX)
            }
            LayoutError::EncryptedCodeRegion { address, size } => write!(
                f,
                "encrypted code region 0x{:08X}+0x{:X} must be 4 KiB aligned and at most 0x{:X} bytes",
                address, size, ENCRYPTED_CODE_MAX
            ),
            LayoutError::UserCodeOutsideFlash { address, size } => write!(
                f,
                "user code 0x{:08X}+0x{:X} is not inside flash after the load table",
                address, size
            ),
            LayoutError::StringTooLong { field, max } => {
                write!(f, "{} is longer than {} bytes", field, max)
            }
        }
    }
}

/// Rejected input of [`LoadTable::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Input is not exactly 4096 bytes.
    Length { len: usize },
    /// Identification tag is not `SONIXDEV`.
    Mark { found: [u8; 8] },
    /// Boot priority slot names an unknown device class.
    UnknownBootDevice { slot: usize, device: u32 },
    /// Manual load count above 10.
    ManualLoadCount { count: u32 },
    /// Packed field holds a reserved value.
    InvalidField { offset: usize, value: u32 },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            DecodeError::Length { len } => {
                write!(f, "load table is {} bytes, expected {}", len, TABLE_SIZE)
            }
            DecodeError::Mark { found } => write!(f, "bad identification tag {:02x?}", found),
            DecodeError::UnknownBootDevice { slot, device } => {
                write!(f, "boot slot {} has unknown device 0x{:02X}", slot, device)
            }
            DecodeError::ManualLoadCount { count } => {
                write!(f, "manual load count {} above {}", count, ManualLoad::MAX_SECTIONS)
            }
            DecodeError::InvalidField { offset, value } => {
                write!(f, "invalid value 0x{:X} at offset 0x{:03X}", value, offset)
            }
        }
    }
}

/// Which checksum a [`ChecksumField`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumKind {
    /// `CRC_CHK_SUM`, over the user code.
    UserCode,
    /// `ENCRYPTER.CRC_SUM_EXT`, over the SRAM code.
    EncrypterExt,
    /// `ENCRYPTER.CRC_SUM_DPD`, over the deep-power-down code.
    EncrypterDpd,
    /// `MANUAL_LOAD.sec[n].CRC_CHECKSUM`.
    ManualSection(u8),
    /// `INFO.TABLE_CHK_SUM`, over the table itself.
    Table,
}

impl core::fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChecksumKind::UserCode => f.write_str("CRC_CHK_SUM"),
            ChecksumKind::EncrypterExt => f.write_str("ENCRYPTER.CRC_SUM_EXT"),
            ChecksumKind::EncrypterDpd => f.write_str("ENCRYPTER.CRC_SUM_DPD"),
            ChecksumKind::ManualSection(n) => write!(f, "MANUAL_LOAD.sec[{}].CRC_CHECKSUM", n),
            ChecksumKind::Table => f.write_str("INFO.TABLE_CHK_SUM"),
        }
    }
}

/// A checksum slot the flashing tool overwrites in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChecksumField {
    pub kind: ChecksumKind,
    /// Byte offset inside the table.
    pub offset: usize,
    pub value: Checksum,
}

/// Checksum slots present in every table.
pub const CHECKSUM_OFFSETS: [(ChecksumKind, usize); 2] = [
    (ChecksumKind::UserCode, ROM_CONFIG.start + rom_offset::CRC_CHK_SUM),
    (ChecksumKind::Table, ROM_CONFIG.start + rom_offset::INFO + 0x0C),
];

/// Checksum slots present only with an encrypter.
pub const ENCRYPTER_CHECKSUM_OFFSETS: [(ChecksumKind, usize); 2] = [
    (ChecksumKind::EncrypterExt, ROM_CONFIG.start + rom_offset::ENCRYPTER + 0x04),
    (ChecksumKind::EncrypterDpd, ROM_CONFIG.start + rom_offset::ENCRYPTER + 0x08),
];

/// The whole 4 KiB table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadTable {
    pub rom: RomBootConfig,
    pub loader: LoaderConfig,
    pub usb: UsbPlatformInfo,
    pub fw_info: FirmwareInfo,
}

impl LoadTable {
    /// Table for `config` with the SONiX reference settings.
    ///
    /// The encrypter record and `ENCRYPTED_BOOT_CODE` are set only when `config.encrypted`
    /// is; otherwise the encrypter record stays zero and the ROM skips AES.
    pub const fn new(config: &BuildConfig) -> Self {
        let mut rom = RomBootConfig::new(config.pram);
        if config.encrypted {
            rom.load_cfg = rom.load_cfg.with_encrypted_boot_code(true);
            rom.encrypter = Some(Encrypter::new(config.sram));
        }

        Self {
            rom,
            loader: LoaderConfig::EMPTY,
            usb: UsbPlatformInfo::SONIX,
            fw_info: FirmwareInfo {
                pram: config.pram,
                sram: config.sram,
                core1: config.core1,
                ext: config.ext,
                flash_size: config.flash_size,
                load_table_address: config.load_table_address,
                ..FirmwareInfo::EMPTY
            },
        }
    }

    /// Check the cross-field rules the ROM relies on.
    pub const fn check(&self) -> Result<(), LayoutError> {
        if let Some(list) = &self.rom.manual_load {
            let count = list.count();
            if count == 0 || count > ManualLoad::MAX_SECTIONS {
                return Err(LayoutError::ManualLoadCount { count });
            }
        }

        // The ROM ignores an unmarked record.
        if let Some(enc) = &self.rom.encrypter {
            if enc.marked {
                if let Some(pin) = enc.invalid_pin() {
                    return Err(LayoutError::InvalidPin { pin });
                }
                let regions = [enc.sram_code, enc.dpd_code];
                let mut i = 0;
                while i < regions.len() {
                    let r = regions[i];
                    if r.address % ENCRYPTED_CODE_ALIGN != 0
                        || r.size % ENCRYPTED_CODE_ALIGN != 0
                        || r.size > ENCRYPTED_CODE_MAX
                    {
                        return Err(LayoutError::EncryptedCodeRegion {
                            address: r.address,
                            size: r.size,
                        });
                    }
                    i += 1;
                }
            }
        }

        self.check_user_code()
    }

    /// User code must sit in flash, past the table itself.
    const fn check_user_code(&self) -> Result<(), LayoutError> {
        let user = self.rom.user_code;
        if self.fw_info.flash_size != 0 {
            let flash = CodeRegion::new(self.fw_info.load_table_address, self.fw_info.flash_size);
            let after_table = match self.fw_info.load_table_address.checked_add(TABLE_SIZE as u32) {
                Some(addr) => user.address >= addr,
                None => false,
            };
            if !after_table || !user.within(&flash) {
                return Err(LayoutError::UserCodeOutsideFlash {
                    address: user.address,
                    size: user.size,
                });
            }
        }

        Ok(())
    }

    /// Byte image of the table.
    ///
    /// Panics on a [`LayoutError`], so a bad table used in a `static` fails the build.
    pub const fn encode(&self) -> [u8; TABLE_SIZE] {
        match self.check() {
            Ok(()) => self.encode_unchecked(),
            Err(e) => e.panic(),
        }
    }

    /// Byte image of the table, or the first layout rule it breaks.
    pub const fn try_encode(&self) -> Result<[u8; TABLE_SIZE], LayoutError> {
        match self.check() {
            Ok(()) => Ok(self.encode_unchecked()),
            Err(e) => Err(e),
        }
    }

    const fn encode_unchecked(&self) -> [u8; TABLE_SIZE] {
        let mut w = Writer::<TABLE_SIZE>::new();
        self.rom.encode(&mut w, ROM_CONFIG.start);
        self.loader.encode(&mut w, LOADER_CONFIG.start);
        self.usb.encode(&mut w, USB_INFO.start);
        self.fw_info.encode(&mut w, FW_INFO.start);
        w.finish()
    }

    /// Parse a table read back from flash. Reserved ranges are not inspected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != TABLE_SIZE {
            return Err(DecodeError::Length { len: bytes.len() });
        }
        let r = Reader::new(bytes);
        Ok(Self {
            rom: RomBootConfig::decode(&r, ROM_CONFIG.start)?,
            loader: LoaderConfig::decode(&r, LOADER_CONFIG.start),
            usb: UsbPlatformInfo::decode(&r, USB_INFO.start),
            fw_info: FirmwareInfo::decode(&r, FW_INFO.start),
        })
    }

    /// Every checksum slot of this table, with its current value.
    pub fn checksum_fields(&self) -> impl Iterator<Item = ChecksumField> + '_ {
        let rom = &self.rom;
        let fixed = CHECKSUM_OFFSETS.iter().map(move |&(kind, offset)| ChecksumField {
            kind,
            offset,
            value: match kind {
                ChecksumKind::UserCode => rom.crc,
                _ => rom.info.table_checksum,
            },
        });
        let encrypter = rom.encrypter.iter().flat_map(|enc| {
            ENCRYPTER_CHECKSUM_OFFSETS
                .iter()
                .map(move |&(kind, offset)| ChecksumField {
                    kind,
                    offset,
                    value: match kind {
                        ChecksumKind::EncrypterExt => enc.crc_ext,
                        _ => enc.crc_dpd,
                    },
                })
        });
        let sections = rom.manual_load.iter().flat_map(|list| {
            list.sections()
                .iter()
                .enumerate()
                .map(|(i, s)| ChecksumField {
                    kind: ChecksumKind::ManualSection(i as u8),
                    offset: ManualLoad::crc_offset(i),
                    value: s.crc,
                })
        });
        fixed.chain(encrypter).chain(sections)
    }
}

/// Whether the reserved and padding ranges of `bytes` are all zero.
pub fn reserved_is_zero(bytes: &[u8; TABLE_SIZE]) -> bool {
    let r = Reader::new(bytes);
    r.is_zero(RESERVED_400.start, RESERVED_400.end)
        && r.is_zero(RESERVED_700.start, RESERVED_700.end)
        && r.is_zero(PADDING.start, PADDING.end)
}

/// Place a load table in the `.load_table` link section.
///
/// Takes a [`BuildConfig`] (with the reference settings applied by [`LoadTable::new`]) or,
/// with `table:`, a fully built [`LoadTable`]. The table is encoded during const
/// evaluation; a layout error is a compile error.
///
/// ```
/// use snc7330_boot::load_table::{BuildConfig, CodeRegion, LoadTable};
///
/// const DATA: [CodeRegion; 27] = [CodeRegion::new(0x6010_0000, 0x1000); 27];
///
/// snc7330_boot::load_table!(table: {
///     let mut table = LoadTable::new(&BuildConfig::DEFAULT);
///     table.fw_info = table.fw_info.with_data(&DATA);
///     table
/// });
/// # fn main() { assert_eq!(&LOAD_TABLE[..8], b"SONIXDEV"); }
/// ```
///
/// More data regions than the table holds fail the build:
///
/// ```compile_fail
/// use snc7330_boot::load_table::{BuildConfig, CodeRegion, LoadTable};
///
/// const DATA: [CodeRegion; 28] = [CodeRegion::new(0x6010_0000, 0x1000); 28];
///
/// snc7330_boot::load_table!(table: {
///     let mut table = LoadTable::new(&BuildConfig::DEFAULT);
///     table.fw_info = table.fw_info.with_data(&DATA);
///     table
/// });
/// # fn main() {}
/// ```
///
/// So does a boot file name longer than 24 bytes:
///
/// ```compile_fail
/// use snc7330_boot::load_table::{BootSlot, BuildConfig, FileDevice, FileName, LoadTable};
///
/// snc7330_boot::load_table!(table: {
///     let mut table = LoadTable::new(&BuildConfig::DEFAULT);
///     table.rom.boot_priority[0] = BootSlot::File {
///         device: FileDevice::Sdc0,
///         offset: 0,
///         name: FileName::new("FIRMWARE_IMAGE_VERSION_2.BIN"),
///     };
///     table
/// });
/// # fn main() {}
/// ```
///
/// And so does user code placed over the table itself:
///
/// ```compile_fail
/// use snc7330_boot::load_table::{BuildConfig, CodeRegion};
///
/// snc7330_boot::load_table!(BuildConfig {
///     pram: CodeRegion::new(0x6000_0000, 0x1000),
///     ..BuildConfig::DEFAULT
/// });
/// # fn main() {}
/// ```
///
/// The linker script must keep `.load_table` at the start of flash (`0x6000_0000`).
#[macro_export]
macro_rules! load_table {
    (table: $table:expr) => {
        #[link_section = ".load_table"]
        #[used]
        #[no_mangle]
        pub static LOAD_TABLE: [u8; $crate::load_table::TABLE_SIZE] = {
            const TABLE: $crate::load_table::LoadTable = $table;
            TABLE.encode()
        };
    };
    ($config:expr) => {
        $crate::load_table!(table: $crate::load_table::LoadTable::new(&$config));
    };
}

#[cfg(test)]
mod tests;
