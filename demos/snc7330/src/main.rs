//! Reset-time firmware: places the load table at the start of SPI flash, then runs the
//! hidden-ROM unlock sequence and idles.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use snc7330_boot::load_table::BuildConfig;
use snc7330_boot::regs::Mmio;
use snc7330_boot::unlock::{self, Sequencer};
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

snc7330_boot::load_table!(BuildConfig::DEFAULT);

#[entry]
fn main() -> ! {
    let p = snc7330_boot::init();
    let regs = Mmio::new(p.WDT0, p.FPB, p.SYS0);
    Sequencer::new(regs, unlock::Config::default()).run_and_idle()
}

#[cfg(not(feature = "defmt"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unlock::idle()
}
