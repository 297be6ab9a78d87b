use std::collections::BTreeMap;
use std::vec::Vec;

use super::{Config, Outcome, Sequencer, State};
use crate::fpb::{self, Comp, Ctrl, Replace};
use crate::regs::{Reg, RegisterFile, REMAP_TABLE_ADDR};
use crate::wdt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read(Reg),
    Write(Reg, u32),
}

/// Register file backed by a map. Registers never written read as their reset value.
#[derive(Debug, Default, Clone)]
struct SimRegisters {
    values: BTreeMap<Reg, u32>,
    log: Vec<Access>,
}

impl SimRegisters {
    fn with_osc_ctrl(osc_ctrl: u32) -> Self {
        let mut regs = Self::default();
        // Reset value left behind by the mask ROM: watchdog running, FPB off.
        regs.values.insert(Reg::WdtCfg, wdt::KEY | 1);
        regs.values.insert(Reg::FpCtrl, 0x0000_0260);
        regs.values.insert(Reg::OscCtrl, osc_ctrl);
        regs
    }

    fn get(&self, reg: Reg) -> u32 {
        self.values.get(&reg).copied().unwrap_or(0)
    }

    fn writes(&self) -> Vec<(Reg, u32)> {
        self.log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(reg, value) => Some((reg, value)),
                Access::Read(_) => None,
            })
            .collect()
    }
}

impl RegisterFile for SimRegisters {
    fn read(&mut self, reg: Reg) -> u32 {
        self.log.push(Access::Read(reg));
        self.get(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.log.push(Access::Write(reg, value));
        self.values.insert(reg, value);
    }
}

fn run(osc_ctrl: u32) -> (Outcome, SimRegisters) {
    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(osc_ctrl), Config::default());
    let outcome = seq.run();
    (outcome, seq.into_inner())
}

#[test]
fn gate_closed_halts_with_watchdog_disabled() {
    let (outcome, mut regs) = run(0x0);

    assert_eq!(outcome, Outcome::HaltedLocked);
    assert_eq!(regs.writes(), [(Reg::WdtCfg, wdt::KEY)]);
    assert!(regs
        .log
        .iter()
        .all(|a| !matches!(a, Access::Write(r, _) | Access::Read(r) if r.is_patch_unit())));
    assert!(!wdt::is_enabled(&mut regs));
}

#[test]
fn gate_closed_ignores_other_osc_ctrl_bits() {
    let (outcome, regs) = run(0xFFFF_FFF7);

    assert_eq!(outcome, Outcome::HaltedLocked);
    assert_eq!(regs.writes().len(), 1);
    assert!(regs.writes().iter().all(|(reg, _)| reg.is_watchdog()));
}

#[test]
fn gate_open_patches_and_arms_watchdog() {
    let (outcome, regs) = run(0x8);

    assert_eq!(outcome, Outcome::PatchedAndArmed);
    assert_eq!(regs.get(Reg::RemapTable(0)), 0xBF00_BF00);
    assert_eq!(regs.get(Reg::FpRemap), REMAP_TABLE_ADDR & fpb::REMAP_ADDR_MASK);

    let comp = Comp::from_bits(regs.get(Reg::FpComp(0)));
    assert!(comp.enable());
    assert_eq!(comp.replace(), Replace::Remap);
    assert_eq!(comp.address(), Config::PATCH_ADDRESS);
    assert_eq!(regs.get(Reg::FpComp(0)), 0x0800_54A4 | 1);

    assert_eq!(regs.get(Reg::FpCtrl) & 0b11, 0b11);
    // NUM_CODE/NUM_LIT are preserved by the read-modify-write.
    assert_eq!(Ctrl::from_bits(regs.get(Reg::FpCtrl)).num_code1(), 6);

    let cfg = wdt::Cfg::from_bits(regs.get(Reg::WdtCfg));
    assert!(cfg.wdten());
    assert!(!cfg.wdtie());
    assert_eq!(regs.get(Reg::WdtCfg), 0x5AFA_0001);
}

#[test]
fn gate_open_write_order() {
    let (_, regs) = run(0x8);

    let fp_ctrl = 0x0000_0260 | 0b11;
    assert_eq!(
        regs.writes(),
        [
            (Reg::WdtCfg, 0x5AFA_0000),
            (Reg::RemapTable(0), 0xBF00_BF00),
            (Reg::FpRemap, 0x0000_0180),
            (Reg::FpComp(0), 0x0800_54A5),
            (Reg::FpCtrl, fp_ctrl),
            (Reg::WdtFeed, 0x5AFA_55AA),
            (Reg::WdtCfg, 0x5AFA_0001),
        ]
    );
}

#[test]
fn watchdog_disabled_before_gate_is_read() {
    let (_, regs) = run(0x8);

    let disable = regs
        .log
        .iter()
        .position(|a| *a == Access::Write(Reg::WdtCfg, wdt::KEY))
        .unwrap();
    let gate = regs
        .log
        .iter()
        .position(|a| *a == Access::Read(Reg::OscCtrl))
        .unwrap();
    assert!(disable < gate);
}

#[test]
fn watchdog_fed_before_enable() {
    let (_, regs) = run(0x8);
    let writes = regs.writes();

    let feed = writes.iter().position(|w| w.0 == Reg::WdtFeed).unwrap();
    let enable = writes
        .iter()
        .rposition(|w| *w == (Reg::WdtCfg, 0x5AFA_0001))
        .unwrap();
    assert!(feed < enable);
}

#[test]
fn step_walks_states_in_order() {
    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(0x8), Config::default());

    assert_eq!(seq.state(), State::Start);
    assert_eq!(seq.step(), State::WdtDisabled);
    assert_eq!(seq.step(), State::GateChecked { open: true });
    assert_eq!(seq.step(), State::PatchedAndArmed);
    assert!(seq.state().is_terminal());
}

#[test]
fn terminal_state_is_absorbing() {
    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(0x0), Config::default());
    seq.run();
    let accesses = seq.into_inner().log.len();

    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(0x0), Config::default());
    seq.run();
    assert_eq!(seq.step(), State::HaltedLocked);
    assert_eq!(seq.step(), State::HaltedLocked);
    assert_eq!(seq.into_inner().log.len(), accesses);
}

#[test]
fn gate_closed_is_repeatable_across_resets() {
    let (first_outcome, first) = run(0x0);
    let (second_outcome, second) = run(0x0);

    assert_eq!(first_outcome, second_outcome);
    assert_eq!(first.values, second.values);
    assert_eq!(first.log, second.log);
}

#[test]
fn bad_patch_address_still_arms_watchdog() {
    let config = Config::new(0x0800_54A6, Config::NOP_NOP);
    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(0x8), config);

    assert_eq!(seq.run(), Outcome::PatchedAndArmed);
    let regs = seq.into_inner();
    assert_eq!(regs.get(Reg::FpCtrl) & 0b11, 0);
    assert!(!regs.values.contains_key(&Reg::FpComp(0)));
    assert_eq!(regs.get(Reg::WdtCfg), 0x5AFA_0001);
}

#[test]
fn custom_patch_target() {
    let config = Config::new(0x0800_1000, 0xE7FE_E7FE);
    assert_eq!(Config::default(), Config::new(0x0800_54A4, 0xBF00_BF00));

    let mut seq = Sequencer::new(SimRegisters::with_osc_ctrl(0x8), config);
    assert_eq!(seq.run(), Outcome::PatchedAndArmed);
    let regs = seq.into_inner();
    assert_eq!(regs.get(Reg::RemapTable(0)), 0xE7FE_E7FE);
    assert_eq!(Comp::from_bits(regs.get(Reg::FpComp(0))).address(), 0x0800_1000);
}

#[test]
fn register_addresses_match_memory_map() {
    assert_eq!(Reg::FpCtrl.addr(), 0xE000_2000);
    assert_eq!(Reg::FpRemap.addr(), 0xE000_2004);
    assert_eq!(Reg::FpComp(0).addr(), 0xE000_2008);
    assert_eq!(Reg::FpComp(1).addr(), 0xE000_200C);
    assert_eq!(Reg::WdtCfg.addr(), 0x4000_8000);
    assert_eq!(Reg::WdtClkSource.addr(), 0x4000_8004);
    assert_eq!(Reg::WdtCount.addr(), 0x4000_8008);
    assert_eq!(Reg::WdtFeed.addr(), 0x4000_800C);
    assert_eq!(Reg::OscCtrl.addr(), 0x4500_0000);
    assert_eq!(Reg::RemapTable(1).addr(), 0x2000_0184);
}

#[test]
fn fpb_install_rejects_bad_slots() {
    let mut regs = SimRegisters::default();
    assert_eq!(
        fpb::install(&mut regs, 8, 0x0800_0000, 0),
        Err(fpb::Error::InvalidSlot { slot: 8 })
    );
    assert_eq!(
        fpb::install(&mut regs, 0, 0x2000_0000, 0),
        Err(fpb::Error::AddressOutOfRange { addr: 0x2000_0000 })
    );
    assert!(regs.log.is_empty());
}

#[test]
fn fpb_disable_all_clears_comparators() {
    let (_, mut regs) = run(0x8);
    fpb::disable_all(&mut regs);

    assert_eq!(regs.get(Reg::FpComp(0)), 0);
    assert!(!Ctrl::from_bits(regs.get(Reg::FpCtrl)).enable());
}
