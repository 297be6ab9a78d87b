//! WDT0 (watchdog timer 0).
//!
//! Every write to a WDT0 register must carry [`KEY`] in the upper half-word, otherwise
//! the write is ignored by the hardware.

// `Cfg::keyed` runs the generated setters in const context. Their range asserts expand
// `panic!`, which must resolve to `core::panic!` here rather than the `fmt.rs` forwarder.
#[allow(unused_macros)]
macro_rules! panic {
    ($($x:tt)*) => {
        ::core::panic!($($x)*)
    };
}

use bitfield_struct::bitfield;

use crate::regs::{Reg, RegisterFile};

/// Write key for all WDT0 registers (`0x5AFA` in bits [31:16]).
pub const KEY: u32 = 0x5AFA_0000;

/// Feed pattern written to `WDT0_FEED` together with [`KEY`].
pub const FEED_PATTERN: u16 = 0x55AA;

/// `WDT0_CFG`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct Cfg {
    /// [0] WDTEN: watchdog enable.
    pub wdten: bool,
    /// [1] WDTIE: raise an interrupt instead of resetting.
    pub wdtie: bool,
    /// [15:2] Reserved
    #[bits(14)]
    __reserved0: u16,
    /// [31:16] WDKEY
    #[bits(16)]
    pub key: u16,
}

impl Cfg {
    /// Keyed `WDT0_CFG` value.
    pub const fn keyed(wdten: bool, wdtie: bool) -> Self {
        Self::new()
            .with_wdten(wdten)
            .with_wdtie(wdtie)
            .with_key((KEY >> 16) as u16)
    }
}

/// `WDT0_FEED`.
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct Feed {
    /// [15:0] FV: must be `0x55AA`.
    #[bits(16)]
    pub fv: u16,
    /// [31:16] WDKEY
    #[bits(16)]
    pub key: u16,
}

/// Stop the watchdog.
pub fn disable(regs: &mut impl RegisterFile) {
    regs.write(Reg::WdtCfg, Cfg::keyed(false, false).into_bits());
}

/// Reload the watchdog counter.
pub fn feed(regs: &mut impl RegisterFile) {
    let feed = Feed::new()
        .with_fv(FEED_PATTERN)
        .with_key((KEY >> 16) as u16);
    regs.write(Reg::WdtFeed, feed.into_bits());
}

/// Start the watchdog in reset mode (no interrupt).
pub fn enable(regs: &mut impl RegisterFile) {
    regs.write(Reg::WdtCfg, Cfg::keyed(true, false).into_bits());
}

/// Decode `WDT0_CFG` and report whether the watchdog is running.
#[cfg(test)]
pub(crate) fn is_enabled(regs: &mut impl RegisterFile) -> bool {
    Cfg::from_bits(regs.read(Reg::WdtCfg)).wdten()
}
