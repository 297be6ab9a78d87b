#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod regs;
pub mod syscfg;
pub mod wdt;
pub mod fpb;
pub mod unlock;
pub mod load_table;
pub mod fw_block;

// WDT0: watchdog timer 0, FPB: Cortex-M Flash Patch and Breakpoint unit,
// SYS0: system control block holding `OSC_CTRL`.
embassy_hal_internal::peripherals! {
    WDT0,
    FPB,
    SYS0,
}

/// Take the peripheral singletons.
///
/// This should only be called once at startup, otherwise it panics.
pub fn init() -> Peripherals {
    Peripherals::take()
}
