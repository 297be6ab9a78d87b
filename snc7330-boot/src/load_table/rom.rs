//! ROM boot configuration (`0x000..0x200`).
//!
//! Read by the mask ROM before it loads the user code: identification tag, load flags,
//! PLL setup, SPI flash / SD / NAND interface setup, the optional AES sub-record, the
//! multi-boot priority list and the manual load list.

use bitfield_struct::bitfield;

use super::codec::{field_str, str_field, try_str_field, Reader, Writer};
use super::{Checksum, CodeRegion, DecodeError};

/// Byte offsets inside the ROM boot configuration.
pub mod offset {
    /// `MARK[8]`
    pub const MARK: usize = 0x00;
    /// `LOAD_CFG`
    pub const LOAD_CFG: usize = 0x08;
    /// `ADDR_USERCODE`
    pub const ADDR_USERCODE: usize = 0x10;
    /// `SIZE_USERCODE`
    pub const SIZE_USERCODE: usize = 0x14;
    /// `PLL_CONFIG`
    pub const PLL_CONFIG: usize = 0x18;
    /// `FLM_DIS_AUTOBURN`
    pub const FLM_DIS_AUTOBURN: usize = 0x20;
    /// `CRC_CHK_SUM`
    pub const CRC_CHK_SUM: usize = 0x24;
    /// `AES_KEY[8]`
    pub const AES_KEY: usize = 0x28;
    /// `FLASH_SET`
    pub const FLASH_SET: usize = 0x60;
    /// `SDC_NF_CONFIG`
    pub const SDC_NF_CONFIG: usize = 0x70;
    /// `ENCRYPTER`
    pub const ENCRYPTER: usize = 0x80;
    /// `BOOT_PRIORITY[4]`
    pub const BOOT_PRIORITY: usize = 0xC0;
    /// `MANUAL_LOAD`
    pub const MANUAL_LOAD: usize = 0x140;
    /// `INFO`
    pub const INFO: usize = 0x1F0;
}

/// Record sizes inside the ROM boot configuration.
pub mod size {
    pub const FLASH_SET: usize = 0x10;
    pub const SDC_NF_CONFIG: usize = 0x10;
    /// Encrypter record plus its 32 reserved bytes.
    pub const ENCRYPTER: usize = 0x40;
    /// Used part of the encrypter record.
    pub const ENCRYPTER_FIELDS: usize = 0x20;
    pub const BOOT_SLOT: usize = 0x20;
    pub const BOOT_PRIORITY: usize = 4 * BOOT_SLOT;
    pub const LOAD_SECTION: usize = 0x10;
    pub const MANUAL_LOAD: usize = 0xB0;
    pub const INFO: usize = 0x10;
}

/// Identification tag checked by the mask ROM.
pub const MARK: [u8; 8] = *b"SONIXDEV";

/// Load table revision understood by the SNC7330 mask ROM.
pub const TABLE_VERSION: u32 = 0x5A5A_0033;

/// `LOAD_CFG` word.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct LoadConfig {
    /// [0] ENCRYPTED_BOOT_CODE: decrypt the user code before booting it.
    pub encrypted_boot_code: bool,
    /// [1] CHECK_BOOT_CODE: CRC the user code against `CRC_CHK_SUM`.
    pub check_boot_code: bool,
    /// [2] CHECK_LOAD_TABLE
    pub check_load_table: bool,
    /// [3] NO_SYS_RESET
    pub no_sys_reset: bool,
    /// [4] USE_PLL_SPEEDUP: run the loader from the 162 MHz PLL.
    pub use_pll_speedup: bool,
    /// [5] USE_EXT_CLK: 0 = IHRC feeds the PLL, 1 = HXTAL feeds the PLL.
    pub use_ext_clk: bool,
    /// [7:6] Reserved
    #[bits(2)]
    __reserved0: u8,
    /// [15:8] SYS_CLK_MHz: system clock in MHz, only used with the PLL on.
    #[bits(8)]
    pub sys_clk_mhz: u8,
    /// [27:16] MULTIBOOT_MSK: `0xFFF` enables the boot priority check.
    #[bits(12)]
    pub multiboot_mask: u16,
    /// [31:28] Reserved
    #[bits(4)]
    __reserved1: u8,
}

impl LoadConfig {
    /// `MULTIBOOT_MSK` value enabling the priority boot check.
    pub const MULTIBOOT_ENABLE: u16 = 0xFFF;
}

/// `PLL_CONFIG` word.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct PllConfig {
    /// [5:0] PLL_INTEGER
    #[bits(6)]
    pub integer: u8,
    /// [7:6] Reserved
    #[bits(2)]
    __reserved0: u8,
    /// [27:8] PLL_FRACTION
    #[bits(20)]
    pub fraction: u32,
    /// [31:28] Reserved
    #[bits(4)]
    __reserved1: u8,
}

/// Interface clock divider (`SYS / 2^n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockDivider {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
}

impl ClockDivider {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => ClockDivider::Div1,
            1 => ClockDivider::Div2,
            2 => ClockDivider::Div4,
            _ => ClockDivider::Div8,
        }
    }
}

/// SPI flash read command used by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReadCommand {
    /// `03h`
    Read = 0,
    /// `0Bh`
    FastRead = 1,
    /// `BBh`
    DualIoRead = 2,
    /// `EBh`
    QuadIoRead = 3,
}

impl ReadCommand {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => ReadCommand::Read,
            1 => ReadCommand::FastRead,
            2 => ReadCommand::DualIoRead,
            _ => ReadCommand::QuadIoRead,
        }
    }
}

/// First word of `FLASH_SET`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct FlashClock {
    /// [1:0] CLK_DIV
    #[bits(2)]
    pub clk_div: ClockDivider,
    /// [3:2] READ_TYPE
    #[bits(2)]
    pub read_type: ReadCommand,
    /// [6:4] QUAD_EN_BIT: QE bit position in the flash status register.
    #[bits(3)]
    pub quad_en_bit: u8,
    /// [7] STAY_QUAD_MODE
    pub stay_quad_mode: bool,
    /// [8] INIT_STATUS_REG: write `STATUS_REG` to the flash before loading.
    pub init_status_reg: bool,
    /// [31:9] Reserved
    #[bits(23)]
    __reserved0: u32,
}

/// `FLASH_SET` (`0x60..0x70`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashConfig {
    pub clock: FlashClock,
    /// Flash status register value written when `INIT_STATUS_REG` is set.
    pub status_reg: u32,
    /// Address of a secondary load table; it also supports the priority boot.
    pub manual_table_addr: u32,
}

/// First word of `SDC_NF_CONFIG`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct SdNandClock {
    /// [1:0] SDNF_DIV
    #[bits(2)]
    pub sdnf_div: ClockDivider,
    /// [2] SD1_DIV: SD1 CLK = SYS/2/(SD1_DIV+1)
    pub sd1_div: bool,
    /// [3] CS_PULL_HIGH: CS pin has an internal pull-up (multi-boot).
    pub cs_pull_high: bool,
    /// [8:4] Reserved
    #[bits(5)]
    __reserved0: u8,
    /// [16:9] SD0_DIV: SD0 CLK = SYS/SDNF_DIV/(SD0_DIV+2)
    #[bits(8)]
    pub sd0_div: u8,
    /// [24:17] SD1_SPEED
    #[bits(8)]
    pub sd1_speed: u8,
    /// [31:25] Reserved
    #[bits(7)]
    __reserved1: u8,
}

/// Second word of `SDC_NF_CONFIG`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct SpiClock {
    /// [7:0] SPIDIV
    #[bits(8)]
    pub spidiv: u8,
    /// [10:8] SPIPRS
    #[bits(3)]
    pub spiprs: u8,
    /// [31:11] Reserved
    #[bits(21)]
    __reserved0: u32,
}

/// `SDC_NF_CONFIG` (`0x70..0x80`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SdNandConfig {
    pub clock: SdNandClock,
    pub spi: SpiClock,
}

/// Action taken by the ROM once encryption of the user code is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FinishAction {
    /// Stay in the ROM.
    Pending,
    /// Reset the system.
    Reset,
}

/// GPIO polarity used to signal encryption progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IoPolarity {
    None = 0,
    /// Active high, idle low.
    ActiveHigh = 1,
    /// Active low, idle high.
    ActiveLow = 2,
}

/// Encrypter control word (`ENCRYPTER + 0x0C`).
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct EncrypterControl {
    /// [1:0] ACTION_FINISH: 1 = reset after finishing, else pending.
    #[bits(2)]
    pub action_finish: u8,
    /// [9:2] IO_PROCESSING
    #[bits(8)]
    pub io_processing: u8,
    /// [17:10] IO_OK
    #[bits(8)]
    pub io_ok: u8,
    /// [25:18] IO_FAIL
    #[bits(8)]
    pub io_fail: u8,
    /// [27:26] IO_ACTIVE_STATE
    #[bits(2)]
    pub io_active_state: u8,
    /// [31:28] Reserved
    #[bits(4)]
    __reserved0: u8,
}

/// AES encrypter sub-record (`0x80..0xC0`).
///
/// The ROM enters its AES path only when the record starts with [`Encrypter::MARK`].
/// An unmarked record may still carry settings and a pending `crc_ext`; a table
/// without any encrypter keeps the whole record zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Encrypter {
    /// Record starts with [`Encrypter::MARK`].
    pub marked: bool,
    /// CRC of the extension (SRAM) code.
    pub crc_ext: Checksum,
    /// CRC of the deep-power-down load code.
    pub crc_dpd: Checksum,
    pub finish: FinishAction,
    /// GPIO index (0 = P0.0 ..= 36) raised while encrypting. `None` encodes as
    /// [`Encrypter::IO_NONE`]; any other value is kept as read.
    pub io_processing: Option<u8>,
    pub io_ok: Option<u8>,
    pub io_fail: Option<u8>,
    pub io_active: IoPolarity,
    /// Code decrypted into SRAM at power-on reset. Both fields align with 0x1000,
    /// size at most 0x18000.
    pub sram_code: CodeRegion,
    pub dpd_code: CodeRegion,
}

impl Encrypter {
    /// Activation tag.
    pub const MARK: [u8; 4] = *b"EN__";

    /// Encoded "no pin" value.
    pub const IO_NONE: u8 = 99;

    /// Highest GPIO index (P2.4).
    pub const IO_MAX: u8 = 36;

    /// Settings used by SONiX reference projects: reset when done, no indicator pins.
    pub const fn new(sram_code: CodeRegion) -> Self {
        Self {
            marked: true,
            crc_ext: Checksum::Pending,
            crc_dpd: Checksum::Pending,
            finish: FinishAction::Reset,
            io_processing: None,
            io_ok: None,
            io_fail: None,
            io_active: IoPolarity::ActiveHigh,
            sram_code,
            dpd_code: CodeRegion::EMPTY,
        }
    }

    /// First pin index outside `0..=IO_MAX`, if any.
    pub(crate) const fn invalid_pin(&self) -> Option<u8> {
        let pins = [self.io_processing, self.io_ok, self.io_fail];
        let mut i = 0;
        while i < pins.len() {
            if let Some(pin) = pins[i] {
                if pin > Self::IO_MAX {
                    return Some(pin);
                }
            }
            i += 1;
        }
        None
    }

    const fn pin_bits(pin: Option<u8>) -> u8 {
        match pin {
            Some(pin) => pin,
            None => Self::IO_NONE,
        }
    }

    fn pin_from_bits(bits: u8) -> Option<u8> {
        (bits != Self::IO_NONE).then_some(bits)
    }

    pub const fn control(&self) -> EncrypterControl {
        EncrypterControl::new()
            .with_action_finish(match self.finish {
                FinishAction::Pending => 0,
                FinishAction::Reset => 1,
            })
            .with_io_processing(Self::pin_bits(self.io_processing))
            .with_io_ok(Self::pin_bits(self.io_ok))
            .with_io_fail(Self::pin_bits(self.io_fail))
            .with_io_active_state(self.io_active as u8)
    }

    const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        if self.marked {
            w.bytes(at, &Self::MARK);
        }
        w.u32(at + 0x04, self.crc_ext.raw());
        w.u32(at + 0x08, self.crc_dpd.raw());
        w.u32(at + 0x0C, self.control().into_bits());
        w.u32(at + 0x10, self.sram_code.address);
        w.u32(at + 0x14, self.sram_code.size);
        w.u32(at + 0x18, self.dpd_code.address);
        w.u32(at + 0x1C, self.dpd_code.size);
    }

    fn decode(r: &Reader<'_>, at: usize) -> Result<Option<Self>, DecodeError> {
        if r.is_zero(at, at + size::ENCRYPTER_FIELDS) {
            return Ok(None);
        }
        let tag = r.array::<4>(at);
        let marked = tag == Self::MARK;
        if !marked && tag != [0; 4] {
            return Err(DecodeError::InvalidField {
                offset: at,
                value: u32::from_le_bytes(tag),
            });
        }
        let control = EncrypterControl::from_bits(r.u32(at + 0x0C));
        let io_active = match control.io_active_state() {
            0 => IoPolarity::None,
            1 => IoPolarity::ActiveHigh,
            2 => IoPolarity::ActiveLow,
            value => {
                return Err(DecodeError::InvalidField {
                    offset: at + 0x0C,
                    value: value as u32,
                })
            }
        };
        Ok(Some(Self {
            marked,
            crc_ext: Checksum::from_raw(r.u32(at + 0x04)),
            crc_dpd: Checksum::from_raw(r.u32(at + 0x08)),
            finish: match control.action_finish() {
                1 => FinishAction::Reset,
                _ => FinishAction::Pending,
            },
            io_processing: Self::pin_from_bits(control.io_processing()),
            io_ok: Self::pin_from_bits(control.io_ok()),
            io_fail: Self::pin_from_bits(control.io_fail()),
            io_active,
            sram_code: CodeRegion::new(r.u32(at + 0x10), r.u32(at + 0x14)),
            dpd_code: CodeRegion::new(r.u32(at + 0x18), r.u32(at + 0x1C)),
        }))
    }
}

/// Storage device class of a boot priority slot (`DEVICE` bit mask).
pub mod device {
    pub const NONE: u32 = 0x00;
    pub const FLASH: u32 = 0x01;
    pub const SDC1: u32 = 0x02;
    pub const NAND: u32 = 0x04;
    pub const SPI_NAND: u32 = 0x08;
    pub const SDC0: u32 = 0x10;
}

/// Devices that locate the image by offset and file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FileDevice {
    Sdc1,
    Nand,
    SpiNand,
    Sdc0,
}

impl FileDevice {
    /// `DEVICE` mask value.
    pub const fn mask(self) -> u32 {
        match self {
            FileDevice::Sdc1 => device::SDC1,
            FileDevice::Nand => device::NAND,
            FileDevice::SpiNand => device::SPI_NAND,
            FileDevice::Sdc0 => device::SDC0,
        }
    }

    pub const fn from_mask(mask: u32) -> Option<Self> {
        match mask {
            device::SDC1 => Some(FileDevice::Sdc1),
            device::NAND => Some(FileDevice::Nand),
            device::SPI_NAND => Some(FileDevice::SpiNand),
            device::SDC0 => Some(FileDevice::Sdc0),
            _ => None,
        }
    }
}

/// 24-byte, zero-padded boot file name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileName([u8; 24]);

impl FileName {
    /// Panics (a compile error in `const` context) if `name` is longer than 24 bytes.
    pub const fn new(name: &str) -> Self {
        Self(str_field(name))
    }

    pub const fn try_new(name: &str) -> Option<Self> {
        match try_str_field(name) {
            Some(bytes) => Some(Self(bytes)),
            None => None,
        }
    }

    pub const fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }

    /// Name up to the first NUL, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        field_str(&self.0)
    }
}

impl core::fmt::Debug for FileName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{:?}", s),
            None => write!(f, "{:02x?}", &self.0),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FileName {
    fn format(&self, fmt: defmt::Formatter) {
        match self.as_str() {
            Some(s) => defmt::write!(fmt, "{=str}", s),
            None => defmt::write!(fmt, "{=[u8]:x}", &self.0[..]),
        }
    }
}

/// One `BOOT_PRIORITY` slot.
///
/// On the wire a slot is `DEVICE` followed by a 28-byte overlay whose meaning depends on
/// `DEVICE`: `{FLASH, NONE}` for SPI flash and `{OFFSET, FILE_NAME[24]}` for every
/// other device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootSlot {
    /// `DEVICE = 0`, slot unused.
    Empty,
    /// Boot from SPI flash at `address`.
    Flash { address: u32 },
    /// Boot from the file `name` at `offset` on a card or NAND device.
    File {
        device: FileDevice,
        offset: u32,
        name: FileName,
    },
}

impl BootSlot {
    /// `DEVICE` mask value.
    pub const fn device_mask(&self) -> u32 {
        match self {
            BootSlot::Empty => device::NONE,
            BootSlot::Flash { .. } => device::FLASH,
            BootSlot::File { device, .. } => device.mask(),
        }
    }

    const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        w.u32(at, self.device_mask());
        match self {
            BootSlot::Empty => {}
            BootSlot::Flash { address } => {
                w.u32(at + 4, *address);
                w.u32(at + 8, 0);
            }
            BootSlot::File { offset, name, .. } => {
                w.u32(at + 4, *offset);
                w.bytes(at + 8, name.as_bytes());
            }
        }
    }

    fn decode(r: &Reader<'_>, at: usize, slot: usize) -> Result<Self, DecodeError> {
        let mask = r.u32(at);
        match mask {
            device::NONE => Ok(BootSlot::Empty),
            device::FLASH => Ok(BootSlot::Flash {
                address: r.u32(at + 4),
            }),
            _ => match FileDevice::from_mask(mask) {
                Some(device) => Ok(BootSlot::File {
                    device,
                    offset: r.u32(at + 4),
                    name: FileName::from_bytes(r.array(at + 8)),
                }),
                None => Err(DecodeError::UnknownBootDevice { slot, device: mask }),
            },
        }
    }
}

/// One manual load section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadSection {
    pub destination: u32,
    pub source: u32,
    pub size: u32,
    pub crc: Checksum,
}

impl LoadSection {
    pub const EMPTY: Self = Self {
        destination: 0,
        source: 0,
        size: 0,
        crc: Checksum::Value(0),
    };

    /// Section copying `size` bytes from `source` to `destination`, CRC left to the tool.
    pub const fn new(destination: u32, source: u32, size: u32) -> Self {
        Self {
            destination,
            source,
            size,
            crc: Checksum::Pending,
        }
    }
}

/// `MANUAL_LOAD` (`0x140..0x1F0`): 1 to 10 sections copied by the ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManualLoad {
    count: u8,
    sections: [LoadSection; ManualLoad::MAX_SECTIONS],
}

impl ManualLoad {
    pub const MAX_SECTIONS: usize = 10;

    /// Build the list. Panics (a compile error in `const` context) unless
    /// `1 <= sections.len() <= 10`.
    pub const fn new(sections: &[LoadSection]) -> Self {
        match Self::try_new(sections) {
            Some(list) => list,
            None => panic!("manual load needs 1 to 10 sections"),
        }
    }

    pub const fn try_new(sections: &[LoadSection]) -> Option<Self> {
        if sections.is_empty() || sections.len() > Self::MAX_SECTIONS {
            return None;
        }
        let mut out = [LoadSection::EMPTY; Self::MAX_SECTIONS];
        let mut i = 0;
        while i < sections.len() {
            out[i] = sections[i];
            i += 1;
        }
        Some(Self {
            count: sections.len() as u8,
            sections: out,
        })
    }

    pub const fn count(&self) -> usize {
        self.count as usize
    }

    pub fn sections(&self) -> &[LoadSection] {
        &self.sections[..self.count()]
    }

    /// Offset of section `index`'s checksum inside the load table.
    pub const fn crc_offset(index: usize) -> usize {
        super::ROM_CONFIG.start + offset::MANUAL_LOAD + 4 + index * size::LOAD_SECTION + 0x0C
    }

    const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        w.u32(at, self.count as u32);
        let mut i = 0;
        while i < self.count() {
            let s = &self.sections[i];
            let base = at + 4 + i * size::LOAD_SECTION;
            w.u32(base, s.destination);
            w.u32(base + 0x4, s.source);
            w.u32(base + 0x8, s.size);
            w.u32(base + 0xC, s.crc.raw());
            i += 1;
        }
    }

    fn decode(r: &Reader<'_>, at: usize) -> Result<Option<Self>, DecodeError> {
        let count = r.u32(at);
        if count == 0 {
            return Ok(None);
        }
        if count as usize > Self::MAX_SECTIONS {
            return Err(DecodeError::ManualLoadCount { count });
        }
        let mut sections = [LoadSection::EMPTY; Self::MAX_SECTIONS];
        for (i, s) in sections.iter_mut().take(count as usize).enumerate() {
            let base = at + 4 + i * size::LOAD_SECTION;
            *s = LoadSection {
                destination: r.u32(base),
                source: r.u32(base + 0x4),
                size: r.u32(base + 0x8),
                crc: Checksum::from_raw(r.u32(base + 0xC)),
            };
        }
        Ok(Some(Self {
            count: count as u8,
            sections,
        }))
    }
}

/// `INFO` (`0x1F0..0x200`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableInfo {
    /// Address of the boot code version string.
    pub boot_code_version_addr: u32,
    pub boot_code_version: u32,
    /// Load table revision tag.
    pub table_version: u32,
    /// Whole-table checksum.
    pub table_checksum: Checksum,
}

/// ROM boot configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RomBootConfig {
    pub load_cfg: LoadConfig,
    /// `ADDR_USERCODE` / `SIZE_USERCODE`: user code image and its maximum size.
    pub user_code: CodeRegion,
    pub pll: PllConfig,
    pub flash_autoburn_disable: u32,
    /// CRC of the user code, checked when `CHECK_BOOT_CODE` is set.
    pub crc: Checksum,
    pub aes_key: [u32; 8],
    pub flash: FlashConfig,
    pub sd_nand: SdNandConfig,
    pub encrypter: Option<Encrypter>,
    pub boot_priority: [BootSlot; 4],
    pub manual_load: Option<ManualLoad>,
    pub info: TableInfo,
}

impl RomBootConfig {
    pub const SIZE: usize = 0x200;

    /// SONiX reference settings for `user_code`.
    pub const fn new(user_code: CodeRegion) -> Self {
        Self {
            load_cfg: LoadConfig::new()
                .with_use_pll_speedup(true)
                .with_no_sys_reset(true),
            user_code,
            pll: PllConfig::new(),
            flash_autoburn_disable: 0,
            crc: Checksum::Pending,
            aes_key: [0; 8],
            flash: FlashConfig {
                clock: FlashClock::new()
                    .with_clk_div(ClockDivider::Div4)
                    .with_read_type(ReadCommand::FastRead),
                status_reg: 0,
                manual_table_addr: 0,
            },
            sd_nand: SdNandConfig {
                clock: SdNandClock::new().with_sd1_speed(2),
                spi: SpiClock::new(),
            },
            encrypter: None,
            boot_priority: [BootSlot::Empty; 4],
            manual_load: None,
            info: TableInfo {
                boot_code_version_addr: 0,
                boot_code_version: 0,
                table_version: TABLE_VERSION,
                table_checksum: Checksum::Pending,
            },
        }
    }

    pub(crate) const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        w.bytes(at + offset::MARK, &MARK);
        w.u32(at + offset::LOAD_CFG, self.load_cfg.into_bits());
        w.u32(at + offset::ADDR_USERCODE, self.user_code.address);
        w.u32(at + offset::SIZE_USERCODE, self.user_code.size);
        w.u32(at + offset::PLL_CONFIG, self.pll.into_bits());
        w.u32(at + offset::FLM_DIS_AUTOBURN, self.flash_autoburn_disable);
        w.u32(at + offset::CRC_CHK_SUM, self.crc.raw());
        w.u32s(at + offset::AES_KEY, &self.aes_key);

        w.u32(at + offset::FLASH_SET, self.flash.clock.into_bits());
        w.u32(at + offset::FLASH_SET + 0x4, self.flash.status_reg);
        w.u32(at + offset::FLASH_SET + 0x8, self.flash.manual_table_addr);

        w.u32(at + offset::SDC_NF_CONFIG, self.sd_nand.clock.into_bits());
        w.u32(at + offset::SDC_NF_CONFIG + 0x4, self.sd_nand.spi.into_bits());

        if let Some(enc) = &self.encrypter {
            enc.encode(w, at + offset::ENCRYPTER);
        }

        let mut i = 0;
        while i < self.boot_priority.len() {
            self.boot_priority[i].encode(w, at + offset::BOOT_PRIORITY + i * size::BOOT_SLOT);
            i += 1;
        }

        if let Some(list) = &self.manual_load {
            list.encode(w, at + offset::MANUAL_LOAD);
        }

        w.u32(at + offset::INFO, self.info.boot_code_version_addr);
        w.u32(at + offset::INFO + 0x4, self.info.boot_code_version);
        w.u32(at + offset::INFO + 0x8, self.info.table_version);
        w.u32(at + offset::INFO + 0xC, self.info.table_checksum.raw());
    }

    pub(crate) fn decode(r: &Reader<'_>, at: usize) -> Result<Self, DecodeError> {
        let mark = r.array::<8>(at + offset::MARK);
        if mark != MARK {
            return Err(DecodeError::Mark { found: mark });
        }

        let mut boot_priority = [BootSlot::Empty; 4];
        for (i, slot) in boot_priority.iter_mut().enumerate() {
            *slot = BootSlot::decode(r, at + offset::BOOT_PRIORITY + i * size::BOOT_SLOT, i)?;
        }

        Ok(Self {
            load_cfg: LoadConfig::from_bits(r.u32(at + offset::LOAD_CFG)),
            user_code: CodeRegion::new(
                r.u32(at + offset::ADDR_USERCODE),
                r.u32(at + offset::SIZE_USERCODE),
            ),
            pll: PllConfig::from_bits(r.u32(at + offset::PLL_CONFIG)),
            flash_autoburn_disable: r.u32(at + offset::FLM_DIS_AUTOBURN),
            crc: Checksum::from_raw(r.u32(at + offset::CRC_CHK_SUM)),
            aes_key: r.u32s(at + offset::AES_KEY),
            flash: FlashConfig {
                clock: FlashClock::from_bits(r.u32(at + offset::FLASH_SET)),
                status_reg: r.u32(at + offset::FLASH_SET + 0x4),
                manual_table_addr: r.u32(at + offset::FLASH_SET + 0x8),
            },
            sd_nand: SdNandConfig {
                clock: SdNandClock::from_bits(r.u32(at + offset::SDC_NF_CONFIG)),
                spi: SpiClock::from_bits(r.u32(at + offset::SDC_NF_CONFIG + 0x4)),
            },
            encrypter: Encrypter::decode(r, at + offset::ENCRYPTER)?,
            boot_priority,
            manual_load: ManualLoad::decode(r, at + offset::MANUAL_LOAD)?,
            info: TableInfo {
                boot_code_version_addr: r.u32(at + offset::INFO),
                boot_code_version: r.u32(at + offset::INFO + 0x4),
                table_version: r.u32(at + offset::INFO + 0x8),
                table_checksum: Checksum::from_raw(r.u32(at + offset::INFO + 0xC)),
            },
        })
    }
}
