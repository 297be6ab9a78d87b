//! Hidden-ROM unlock sequence.
//!
//! Runs once at reset, before any application code:
//!
//! 1. Stop WDT0 (it may still be running from the mask ROM).
//! 2. Sample the hidden-ROM gate in `OSC_CTRL`.
//! 3. Gate closed: idle forever with the watchdog stopped.
//! 4. Gate open: remap one word of the protected ROM routine through the FPB, feed and
//!    start WDT0, then idle. If the patched routine never hands back control, the
//!    watchdog resets the device into the mask ROM.
//!
//! ```text
//! Start -> WdtDisabled -> GateChecked -+-> PatchedAndArmed
//!                                      +-> HaltedLocked
//! ```
//!
//! ```no_run
//! use snc7330_boot::regs::Mmio;
//! use snc7330_boot::unlock::{self, Sequencer};
//!
//! let p = snc7330_boot::init();
//! let regs = Mmio::new(p.WDT0, p.FPB, p.SYS0);
//! Sequencer::new(regs, unlock::Config::default()).run_and_idle()
//! ```

use crate::regs::RegisterFile;
use crate::{fpb, syscfg, wdt};

/// Comparator used for the patch.
const PATCH_SLOT: u8 = 0;

/// Unlock sequence configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// Word address inside the protected ROM routine to replace.
    pub patch_address: u32,
    /// Replacement word. The default is two Thumb `NOP`s (`0xBF00`), dropping the branch
    /// that would otherwise lock the hidden ROM.
    pub patch_word: u32,
}

impl Config {
    /// Address of the branch patched out of the ROM routine.
    pub const PATCH_ADDRESS: u32 = 0x0800_54A4;

    /// Two Thumb `NOP`s.
    pub const NOP_NOP: u32 = 0xBF00_BF00;

    /// Replace the word at `patch_address` with `patch_word`.
    pub const fn new(patch_address: u32, patch_word: u32) -> Self {
        Self {
            patch_address,
            patch_word,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::PATCH_ADDRESS, Self::NOP_NOP)
    }
}

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing has been written yet.
    Start,
    /// WDT0 stopped.
    WdtDisabled,
    /// Gate sampled.
    GateChecked {
        /// Whether the hidden ROM is still open.
        open: bool,
    },
    /// Patch installed and WDT0 running.
    PatchedAndArmed,
    /// Gate was closed; nothing further to do.
    HaltedLocked,
}

impl State {
    /// Whether the sequence has finished.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, State::PatchedAndArmed | State::HaltedLocked)
    }
}

/// Terminal state of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Patch installed, watchdog armed. The device resets once WDT0 expires.
    PatchedAndArmed,
    /// Hidden ROM already locked. The device idles with WDT0 stopped.
    HaltedLocked,
}

/// The unlock state machine over a register file.
pub struct Sequencer<R: RegisterFile> {
    regs: R,
    config: Config,
    state: State,
}

impl<R: RegisterFile> Sequencer<R> {
    /// Create a sequencer in [`State::Start`].
    pub fn new(regs: R, config: Config) -> Self {
        Self {
            regs,
            config,
            state: State::Start,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Perform one transition and return the new state.
    ///
    /// Terminal states are absorbing: stepping them again touches no register.
    pub fn step(&mut self) -> State {
        self.state = match self.state {
            State::Start => {
                wdt::disable(&mut self.regs);
                State::WdtDisabled
            }
            State::WdtDisabled => {
                let osc = syscfg::read_osc_ctrl(&mut self.regs);
                debug!("OSC_CTRL=0x{:08X}", osc.raw());
                State::GateChecked {
                    open: osc.hidden_rom_open(),
                }
            }
            State::GateChecked { open: false } => State::HaltedLocked,
            State::GateChecked { open: true } => {
                self.patch_and_arm();
                State::PatchedAndArmed
            }
            terminal => terminal,
        };
        self.state
    }

    /// Run to a terminal state and return it.
    pub fn run(&mut self) -> Outcome {
        loop {
            match self.step() {
                State::PatchedAndArmed => return Outcome::PatchedAndArmed,
                State::HaltedLocked => return Outcome::HaltedLocked,
                _ => {}
            }
        }
    }

    /// Run the sequence and idle forever.
    pub fn run_and_idle(mut self) -> ! {
        let outcome = self.run();
        info!("unlock: {:?}", outcome);
        idle()
    }

    /// Release the register file.
    pub fn into_inner(self) -> R {
        self.regs
    }

    fn patch_and_arm(&mut self) {
        let Config {
            patch_address,
            patch_word,
        } = self.config;

        if let Err(e) = fpb::install(&mut self.regs, PATCH_SLOT, patch_address, patch_word) {
            // Leave the unit disabled and let the watchdog bring the device back to ROM.
            warn!("FPB install failed: {:?}", e);
        } else {
            fpb::enable(&mut self.regs);
        }

        wdt::feed(&mut self.regs);
        wdt::enable(&mut self.regs);
    }
}

/// Park the core. Never returns.
pub fn idle() -> ! {
    loop {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                cortex_m::asm::nop();
            } else {
                core::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests;
