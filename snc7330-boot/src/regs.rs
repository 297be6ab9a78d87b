//! Register map and register-file abstraction.
//!
//! Every register the boot stage touches is named by a [`Reg`]. Code that drives the
//! hardware goes through a [`RegisterFile`], so the same sequence runs against the real
//! memory-mapped registers ([`Mmio`]) or against a simulated register file in tests.
//!
//! # Reference
//! - ARMv7-M ARM, C1.11 "Flash Patch and Breakpoint unit"
//! - SNC7330 series datasheet, WDT0 and OSC_CTRL chapters

use core::marker::PhantomData;
use core::ptr;

use embassy_hal_internal::Peripheral;

use crate::peripherals;

/// Flash Patch and Breakpoint unit base.
pub const FPB_BASE: u32 = 0xE000_2000;

/// Number of FPB comparators implemented on the Cortex-M4 core.
pub const FPB_COMP_COUNT: u8 = 8;

/// WDT0 base.
pub const WDT0_BASE: u32 = 0x4000_8000;

/// `OSC_CTRL` system register. Bit 3 reports whether the hidden ROM is still open.
pub const OSC_CTRL_ADDR: u32 = 0x4500_0000;

/// RAM remap table consumed by the FPB.
///
/// The FPB fetches replacement words from `FP_REMAP + 4 * n` for comparator `n`.
pub const REMAP_TABLE_ADDR: u32 = 0x2000_0180;

/// Remap table length (one word per comparator).
pub const REMAP_TABLE_LEN: u8 = FPB_COMP_COUNT;

/// A register (or RAM word) used by the boot stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    /// `FP_CTRL` (0xE000_2000).
    FpCtrl,
    /// `FP_REMAP` (0xE000_2004).
    FpRemap,
    /// `FP_COMPn` (0xE000_2008 + 4n).
    FpComp(u8),
    /// `WDT0_CFG` (0x4000_8000).
    WdtCfg,
    /// `WDT0_CLKSOURCE` (0x4000_8004).
    WdtClkSource,
    /// `WDT0_TC` (0x4000_8008).
    WdtCount,
    /// `WDT0_FEED` (0x4000_800C).
    WdtFeed,
    /// `OSC_CTRL` (0x4500_0000).
    OscCtrl,
    /// Word `n` of the RAM remap table (0x2000_0180 + 4n).
    RemapTable(u8),
}

impl Reg {
    /// Absolute address of the register.
    pub const fn addr(self) -> u32 {
        match self {
            Reg::FpCtrl => FPB_BASE,
            Reg::FpRemap => FPB_BASE + 0x04,
            Reg::FpComp(n) => FPB_BASE + 0x08 + 4 * n as u32,
            Reg::WdtCfg => WDT0_BASE,
            Reg::WdtClkSource => WDT0_BASE + 0x04,
            Reg::WdtCount => WDT0_BASE + 0x08,
            Reg::WdtFeed => WDT0_BASE + 0x0C,
            Reg::OscCtrl => OSC_CTRL_ADDR,
            Reg::RemapTable(n) => REMAP_TABLE_ADDR + 4 * n as u32,
        }
    }

    /// Whether this register belongs to the watchdog.
    pub const fn is_watchdog(self) -> bool {
        matches!(
            self,
            Reg::WdtCfg | Reg::WdtClkSource | Reg::WdtCount | Reg::WdtFeed
        )
    }

    /// Whether this register belongs to the breakpoint unit or its remap table.
    pub const fn is_patch_unit(self) -> bool {
        matches!(
            self,
            Reg::FpCtrl | Reg::FpRemap | Reg::FpComp(_) | Reg::RemapTable(_)
        )
    }
}

/// Typed 32-bit register access.
pub trait RegisterFile {
    /// Read a register.
    fn read(&mut self, reg: Reg) -> u32;

    /// Write a register.
    fn write(&mut self, reg: Reg, value: u32);

    /// Read-modify-write a register.
    fn modify(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    /// Make preceding writes visible to instruction fetch.
    fn barrier(&mut self) {}
}

impl<T: RegisterFile + ?Sized> RegisterFile for &mut T {
    fn read(&mut self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }

    fn barrier(&mut self) {
        (**self).barrier()
    }
}

/// Memory-mapped register file.
///
/// Holding the `WDT0`, `FPB` and `SYS0` singletons guarantees that nothing else touches
/// the watchdog or the breakpoint unit while the boot stage owns them.
pub struct Mmio<'d> {
    _phantom: PhantomData<(
        &'d peripherals::WDT0,
        &'d peripherals::FPB,
        &'d peripherals::SYS0,
    )>,
}

impl<'d> Mmio<'d> {
    /// Create the register file from the peripheral singletons.
    pub fn new(
        _wdt: impl Peripheral<P = peripherals::WDT0> + 'd,
        _fpb: impl Peripheral<P = peripherals::FPB> + 'd,
        _sys: impl Peripheral<P = peripherals::SYS0> + 'd,
    ) -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl RegisterFile for Mmio<'_> {
    fn read(&mut self, reg: Reg) -> u32 {
        // SAFETY: `Reg::addr` only yields word-aligned device registers or the remap
        // table in on-chip SRAM, and this type owns the peripherals behind them.
        unsafe { ptr::read_volatile(reg.addr() as *const u32) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        // SAFETY: see `read`.
        unsafe { ptr::write_volatile(reg.addr() as *mut u32, value) }
    }

    fn barrier(&mut self) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                cortex_m::asm::dsb();
                cortex_m::asm::isb();
            } else {
                core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
            }
        }
    }
}
