//! `OSC_CTRL` system register helper.
//!
//! Besides oscillator control, `OSC_CTRL` exposes the hidden-ROM gate: while bit 3 is set
//! the protected ROM routine can still be patched. Once a prior stage locks the hidden
//! ROM the bit reads as 0 and stays 0 until the next power cycle.
//!
//! ```no_run
//! use snc7330_boot::{regs::Mmio, syscfg};
//!
//! let p = snc7330_boot::init();
//! let mut regs = Mmio::new(p.WDT0, p.FPB, p.SYS0);
//! if syscfg::read_osc_ctrl(&mut regs).hidden_rom_open() {
//!     // gate still open
//! }
//! ```

use crate::regs::{Reg, RegisterFile};

/// Bit position of the hidden-ROM gate in `OSC_CTRL`.
pub const HIDDEN_ROM_OPEN_BIT: u32 = 3;

/// Read `OSC_CTRL` and return a parsed [`OscCtrl`].
#[inline]
pub fn read_osc_ctrl(regs: &mut impl RegisterFile) -> OscCtrl {
    OscCtrl::from_raw(regs.read(Reg::OscCtrl))
}

/// Parsed view of the `OSC_CTRL` contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscCtrl {
    raw: u32,
}

impl OscCtrl {
    /// Wrap a raw register value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    /// Gate state (bit 3).
    #[inline]
    pub const fn hidden_rom_open(&self) -> bool {
        self.raw & (1 << HIDDEN_ROM_OPEN_BIT) != 0
    }

    /// Return the raw 32-bit register value.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }
}
