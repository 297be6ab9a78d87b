//! FPB (Flash Patch and Breakpoint unit) programming.
//!
//! The FPB compares instruction fetches against its comparators. In remap mode
//! (`REPLACE = 0b00`) a matching fetch is served from the RAM remap table at
//! `FP_REMAP + 4 * n` instead of from code memory, which lets a ROM instruction be
//! replaced without touching the ROM.
//!
//! # Reference
//! ARMv7-M ARM, C1.11.3 "FPB programmers' model"

// See `wdt.rs`: keep `bitfield-struct` const setters on `core::panic!`.
#[allow(unused_macros)]
macro_rules! panic {
    ($($x:tt)*) => {
        ::core::panic!($($x)*)
    };
}

use bitfield_struct::bitfield;

use crate::regs::{Reg, RegisterFile, FPB_COMP_COUNT, REMAP_TABLE_ADDR, REMAP_TABLE_LEN};

/// `FP_REMAP` address mask (bits [28:5], 32-byte aligned, code/SRAM region only).
pub const REMAP_ADDR_MASK: u32 = 0x1FFF_FFE0;

/// `FP_CTRL`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct Ctrl {
    /// [0] ENABLE
    pub enable: bool,
    /// [1] KEY: must be written as 1 for the write to take effect.
    pub key: bool,
    /// [3:2] Reserved
    #[bits(2)]
    __reserved0: u8,
    /// [7:4] NUM_CODE1
    #[bits(4)]
    pub num_code1: u8,
    /// [11:8] NUM_LIT
    #[bits(4)]
    pub num_lit: u8,
    /// [14:12] NUM_CODE2
    #[bits(3)]
    pub num_code2: u8,
    /// [31:15] Reserved
    #[bits(17)]
    __reserved1: u32,
}

/// Comparator match behaviour (`FP_COMPn.REPLACE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Replace {
    /// Remap to the word in the remap table.
    Remap = 0b00,
    /// Breakpoint on the lower half-word.
    BreakLower = 0b01,
    /// Breakpoint on the upper half-word.
    BreakUpper = 0b10,
    /// Breakpoint on both half-words.
    BreakBoth = 0b11,
}

impl Replace {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Replace::Remap,
            0b01 => Replace::BreakLower,
            0b10 => Replace::BreakUpper,
            _ => Replace::BreakBoth,
        }
    }
}

/// `FP_COMPn`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct Comp {
    /// [0] ENABLE
    pub enable: bool,
    /// [1] Reserved
    #[bits(1)]
    __reserved0: u8,
    /// [28:2] COMP: word address bits [28:2].
    #[bits(27)]
    pub comp: u32,
    /// [29] Reserved
    #[bits(1)]
    __reserved1: u8,
    /// [31:30] REPLACE
    #[bits(2)]
    pub replace: Replace,
}

impl Comp {
    /// Comparator matching the word at `addr`.
    pub const fn matching(addr: u32, replace: Replace) -> Self {
        Self::new()
            .with_enable(true)
            .with_comp((addr >> 2) & 0x07FF_FFFF)
            .with_replace(replace)
    }

    /// Matched word address.
    pub const fn address(&self) -> u32 {
        self.comp() << 2
    }
}

/// Patch installation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Comparator index is not implemented by the core.
    InvalidSlot { slot: u8 },
    /// Patched address is outside the code region the FPB can match (`0x0000_0000..0x2000_0000`).
    AddressOutOfRange { addr: u32 },
    /// Patched address is not word aligned.
    Unaligned { addr: u32 },
}

/// Install a single replacement word.
///
/// Writes `word` into the remap table slot, points `FP_REMAP` at the table, then aims
/// comparator `slot` at `addr` in remap mode and enables the comparator. The unit itself
/// is enabled separately with [`enable`].
pub fn install(
    regs: &mut impl RegisterFile,
    slot: u8,
    addr: u32,
    word: u32,
) -> Result<(), Error> {
    if slot >= FPB_COMP_COUNT || slot >= REMAP_TABLE_LEN {
        return Err(Error::InvalidSlot { slot });
    }
    if addr >= 0x2000_0000 {
        return Err(Error::AddressOutOfRange { addr });
    }
    if addr & 0b11 != 0 {
        return Err(Error::Unaligned { addr });
    }

    regs.write(Reg::RemapTable(slot), word);
    regs.write(Reg::FpRemap, REMAP_TABLE_ADDR & REMAP_ADDR_MASK);
    regs.write(
        Reg::FpComp(slot),
        Comp::matching(addr, Replace::Remap).into_bits(),
    );

    trace!("FPB slot {}: 0x{:08X} -> 0x{:08X}", slot, addr, word);
    Ok(())
}

/// Enable the unit (`FP_CTRL |= KEY | ENABLE`).
pub fn enable(regs: &mut impl RegisterFile) {
    regs.modify(Reg::FpCtrl, |r| {
        Ctrl::from_bits(r).with_key(true).with_enable(true).into_bits()
    });
    regs.barrier();
}

/// Disable every comparator and the unit.
#[cfg(test)]
pub(crate) fn disable_all(regs: &mut impl RegisterFile) {
    for slot in 0..FPB_COMP_COUNT {
        regs.write(Reg::FpComp(slot), 0);
    }
    regs.modify(Reg::FpCtrl, |r| {
        Ctrl::from_bits(r).with_key(true).with_enable(false).into_bits()
    });
    regs.barrier();
}
