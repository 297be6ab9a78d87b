//! Hidden ROM dump over the mask ROM's UART console.
//!
//! The mask ROM answers [`INTERRUPT_PATTERN`] on UART0 with a small console
//! (`w <addr> <value>` writes a word, `xr <addr> <len>` sends memory over XMODEM).
//! By the time the console runs the hidden ROM is already closed, so the dump installs a
//! two-comparator FPB patch from the console, arms WDT0 and interrupts the boot again
//! after the watchdog reset. The patched ROM then leaves the hidden ROM open.
//!
//! The serial transport needs the `dump-rom` feature.

#![cfg_attr(not(feature = "dump-rom"), allow(dead_code))]

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};

use snc7330_boot::fpb::{Comp, Ctrl, Replace, REMAP_ADDR_MASK};
use snc7330_boot::regs::{Reg, REMAP_TABLE_ADDR};
use snc7330_boot::wdt;

pub const BAUD_RATE: u32 = 921_600;

/// Boot interrupt pattern, echoed back by the ROM once it listens.
pub const INTERRUPT_PATTERN: [u8; 4] = [0xAB, 0x5D, 0xEB, 0xEF];

const INTERRUPT_ATTEMPTS: usize = 1000;
const INTERRUPT_TIMEOUT: Duration = Duration::from_millis(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

// The console drops input while it is still busy with the previous command.
const COMMAND_DELAY: Duration = Duration::from_millis(5);

const CONSOLE_BANNER: &[u8] = b"SONiX UART Console:\r\n\0";
const XMODEM_READY: &[u8] = b"XModem waiting for transmission...\r\n\0";

/// Hidden ROM window.
pub const ROM_BASE: u32 = 0x0800_0000;
pub const ROM_SIZE: u32 = 0x1_0000;

/// Mask ROM words replaced while dumping, one FPB comparator each.
pub const CONSOLE_PATCH: [(u32, u32); 2] = [
    // NOP over the write that closes the hidden ROM.
    (0x0800_5418, 0xBF00_0000),
    // Branch over the write that stops WDT0.
    (0x0800_0EF0, 0xE004_0800),
];

/// Byte link to the ROM console.
pub trait Link: Read + Write {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
    fn discard_input(&mut self) -> io::Result<()>;
}

/// How a boot interrupt got its echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// On the first try: a console was already listening.
    Immediate,
    /// After retries: the ROM came out of reset.
    Delayed,
}

fn write_command(addr: u32, value: u32) -> String {
    format!("w {:x} {:x}", addr, value)
}

/// Console commands that install [`CONSOLE_PATCH`] and arm the watchdog.
pub fn patch_commands() -> Vec<String> {
    let mut commands = Vec::new();
    for (slot, &(_, word)) in CONSOLE_PATCH.iter().enumerate() {
        commands.push(write_command(Reg::RemapTable(slot as u8).addr(), word));
    }
    commands.push(write_command(
        Reg::FpRemap.addr(),
        REMAP_TABLE_ADDR & REMAP_ADDR_MASK,
    ));
    for (slot, &(addr, _)) in CONSOLE_PATCH.iter().enumerate() {
        let comp = Comp::matching(addr, Replace::Remap);
        log::debug!("FPB comparator {} matches 0x{:08X}", slot, comp.address());
        commands.push(write_command(Reg::FpComp(slot as u8).addr(), comp.into_bits()));
    }
    // NUM_CODE1 and NUM_LIT as the core reports them.
    let ctrl = Ctrl::new()
        .with_enable(true)
        .with_key(true)
        .with_num_code1(6)
        .with_num_lit(2);
    commands.push(write_command(Reg::FpCtrl.addr(), ctrl.into_bits()));
    commands.push(write_command(
        Reg::WdtCfg.addr(),
        wdt::Cfg::keyed(true, false).into_bits(),
    ));
    commands
}

fn read_byte(link: &mut impl Link) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match link.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn read_up_to(link: &mut impl Link, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    while buf.len() < len {
        match read_byte(link)? {
            Some(b) => buf.push(b),
            None => break,
        }
    }
    Ok(buf)
}

/// Read until `pattern` arrives. `false` when the link times out first.
pub fn read_until(link: &mut impl Link, pattern: &[u8]) -> io::Result<bool> {
    let mut seen = Vec::new();
    while let Some(b) = read_byte(link)? {
        seen.push(b);
        if seen.ends_with(pattern) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Send [`INTERRUPT_PATTERN`] until the ROM echoes it. `None` when it never does.
pub fn interrupt_boot(link: &mut impl Link) -> io::Result<Option<Interrupt>> {
    link.set_read_timeout(INTERRUPT_TIMEOUT)?;
    link.discard_input()?;

    let mut result = None;
    for attempt in 0..INTERRUPT_ATTEMPTS {
        link.write_all(&INTERRUPT_PATTERN)?;
        if read_up_to(link, INTERRUPT_PATTERN.len())? == INTERRUPT_PATTERN {
            result = Some(if attempt == 0 {
                Interrupt::Immediate
            } else {
                Interrupt::Delayed
            });
            break;
        }
    }

    link.set_read_timeout(READ_TIMEOUT)?;
    Ok(result)
}

fn send_command(link: &mut impl Link, command: &str) -> io::Result<()> {
    link.write_all(command.as_bytes())?;
    link.write_all(b"\r")?;
    link.flush()?;
    thread::sleep(COMMAND_DELAY);
    Ok(())
}

fn open_console(link: &mut impl Link) -> Result<()> {
    send_command(link, "")?;
    if !read_until(link, CONSOLE_BANNER)? {
        bail!("No console prompt, reset the board and try again");
    }
    Ok(())
}

/// Bring the ROM to the point where it sends the hidden ROM over XMODEM.
pub fn request_rom(link: &mut impl Link) -> Result<()> {
    log::info!("Interrupting boot");
    if interrupt_boot(link)?.is_none() {
        bail!("Failed to interrupt boot, reset the board and try again");
    }
    open_console(link)?;

    log::info!("Installing console patch");
    for command in patch_commands() {
        log::trace!("> {}", command);
        send_command(link, &command)?;
    }

    // The old console keeps echoing until WDT0 fires.
    loop {
        match interrupt_boot(link)? {
            Some(Interrupt::Immediate) => continue,
            Some(Interrupt::Delayed) => break,
            None => bail!("Failed to interrupt boot after the watchdog reset"),
        }
    }

    log::info!("Boot interrupted after watchdog reset");
    open_console(link)?;
    send_command(link, &format!("xr {:08x} {:x}", ROM_BASE, ROM_SIZE))?;
    if !read_until(link, XMODEM_READY)? {
        bail!("ROM console did not start the XMODEM transfer");
    }
    Ok(())
}

#[cfg(feature = "dump-rom")]
mod serial {
    use std::io;
    use std::time::Duration;

    use anyhow::{anyhow, Context, Result};
    use serialport::{ClearBuffer, SerialPort};

    use super::{request_rom, Link, READ_TIMEOUT, ROM_SIZE};

    impl Link for Box<dyn SerialPort> {
        fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            SerialPort::set_timeout(self.as_mut(), timeout).map_err(io::Error::from)
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.clear(ClearBuffer::Input).map_err(io::Error::from)
        }
    }

    /// Dump the hidden ROM through the console on `port`.
    pub fn dump(port: &str, baud: u32) -> Result<Vec<u8>> {
        let mut link = serialport::new(port, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("Failed to open {}", port))?;

        request_rom(&mut link)?;

        log::info!("Receiving ROM");
        let mut rom = Vec::with_capacity(ROM_SIZE as usize);
        xmodem::Xmodem::new()
            .recv(&mut link, &mut rom, xmodem::Checksum::Standard)
            .map_err(|e| anyhow!("XMODEM transfer failed: {:?}", e))?;
        rom.truncate(ROM_SIZE as usize);
        Ok(rom)
    }
}

#[cfg(feature = "dump-rom")]
pub use serial::dump;

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Simulated ROM console: echoes boot interrupts once it listens and answers the
    /// console commands `request_rom` relies on.
    struct SimConsole {
        rx: VecDeque<u8>,
        line: Vec<u8>,
        commands: Vec<String>,
        /// Interrupts ignored before the ROM listens.
        boot_delay: usize,
        /// Interrupts the old console still echoes after WDT0 is armed.
        echoes_before_reset: usize,
        timeout: Duration,
    }

    impl SimConsole {
        fn new(boot_delay: usize) -> Self {
            Self {
                rx: VecDeque::new(),
                line: Vec::new(),
                commands: Vec::new(),
                boot_delay,
                echoes_before_reset: 0,
                timeout: READ_TIMEOUT,
            }
        }

        fn command(&mut self, command: String) {
            if command.is_empty() {
                self.rx.extend(CONSOLE_BANNER);
            } else if command.starts_with("w 40008000 ") {
                self.echoes_before_reset = 3;
                self.boot_delay = 2;
            } else if command.starts_with("xr ") {
                self.rx.extend(XMODEM_READY);
            }
            self.commands.push(command);
        }
    }

    impl Read for SimConsole {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[0] = b;
                    Ok(1)
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for SimConsole {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf == INTERRUPT_PATTERN {
                if self.echoes_before_reset > 0 {
                    self.echoes_before_reset -= 1;
                    self.rx.extend(INTERRUPT_PATTERN);
                } else if self.boot_delay > 0 {
                    self.boot_delay -= 1;
                } else {
                    self.rx.extend(INTERRUPT_PATTERN);
                }
                return Ok(buf.len());
            }
            for &b in buf {
                if b == b'\r' {
                    let line = std::mem::take(&mut self.line);
                    self.command(String::from_utf8_lossy(&line).into_owned());
                } else {
                    self.line.push(b);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Link for SimConsole {
        fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.rx.clear();
            Ok(())
        }
    }

    #[test]
    fn console_patch_commands() {
        assert_eq!(
            patch_commands(),
            [
                "w 20000180 bf000000",
                "w 20000184 e0040800",
                "w e0002004 180",
                "w e0002008 8005419",
                "w e000200c 8000ef1",
                "w e0002000 263",
                "w 40008000 5afa0001",
            ]
        );
    }

    #[test]
    fn interrupt_reports_retries() {
        let mut console = SimConsole::new(0);
        assert_eq!(
            interrupt_boot(&mut console).unwrap(),
            Some(Interrupt::Immediate)
        );

        let mut console = SimConsole::new(5);
        assert_eq!(
            interrupt_boot(&mut console).unwrap(),
            Some(Interrupt::Delayed)
        );
        assert_eq!(console.timeout, READ_TIMEOUT);

        let mut console = SimConsole::new(usize::MAX);
        assert_eq!(interrupt_boot(&mut console).unwrap(), None);
    }

    #[test]
    fn read_until_times_out() {
        let mut console = SimConsole::new(0);
        console.rx.extend(b"noise SONiX UART Console:\r\n\0");
        assert!(read_until(&mut console, CONSOLE_BANNER).unwrap());
        assert!(!read_until(&mut console, CONSOLE_BANNER).unwrap());
    }

    #[test]
    fn request_rom_runs_the_console_sequence() {
        let mut console = SimConsole::new(4);
        request_rom(&mut console).unwrap();

        let mut expected = vec![String::new()];
        expected.extend(patch_commands());
        expected.push(String::new());
        expected.push("xr 08000000 10000".to_string());
        assert_eq!(console.commands, expected);
        assert_eq!(console.echoes_before_reset, 0);
    }

    #[test]
    fn request_rom_fails_without_console() {
        let mut console = SimConsole::new(usize::MAX);
        assert!(request_rom(&mut console).is_err());
        assert!(console.commands.is_empty());
    }
}
