//! Register file standing in for the controller in tests

extern crate std;

use super::{Command, Register, RegisterAccess};
use core::cell::Cell;
use std::vec::Vec;

const SR_RBS: u32 = 1 << 0;
const SR_TBS1: u32 = 1 << 2;
const SR_TCS1: u32 = 1 << 3;

const REGISTER_COUNT: usize = 15;

fn index(register: Register) -> usize {
    register as usize
}

/// Fake controller
///
/// - a transmission request clears TBS1/TCS1 and completes after
///   `transmit_latency` further reads of SR
/// - with `loopback` set, a transmission request also copies the transmit
///   buffer into the receive buffer and sets RBS
/// - releasing the receive buffer clears RBS
pub(crate) struct FakeRegisters {
    values: [Cell<u32>; REGISTER_COUNT],
    pending_transmission: Cell<Option<u32>>,
    pub(crate) transmit_latency: u32,
    pub(crate) loopback: bool,
    pub(crate) writes: Vec<(Register, u32)>,
}

impl FakeRegisters {
    pub(crate) fn new() -> Self {
        let fake = Self {
            values: Default::default(),
            pending_transmission: Cell::new(None),
            transmit_latency: 0,
            loopback: false,
            writes: Vec::new(),
        };
        fake.set(Register::Sr, SR_TBS1 | SR_TCS1);
        fake
    }

    /// Sets a register value without recording a write
    pub(crate) fn set(&self, register: Register, value: u32) {
        self.values[index(register)].set(value);
    }

    /// Current register value without read side effects
    pub(crate) fn get(&self, register: Register) -> u32 {
        self.values[index(register)].get()
    }

    /// Places a frame into the receive buffer as the controller would
    pub(crate) fn deliver(&self, id: u32, dlc: u8, rda: u32, rdb: u32) {
        self.set(Register::Rfs, u32::from(dlc) << 16);
        self.set(Register::Rid, id);
        self.set(Register::Rda, rda);
        self.set(Register::Rdb, rdb);
        self.set(Register::Sr, self.get(Register::Sr) | SR_RBS);
    }

    /// Marks the transmit buffer as occupied by a transmission in progress
    pub(crate) fn occupy_transmit_buffer(&self) {
        self.set(Register::Sr, self.get(Register::Sr) & !(SR_TBS1 | SR_TCS1));
    }

    pub(crate) fn writes_to(&self, register: Register) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == register)
            .map(|(_, v)| *v)
            .collect()
    }

    fn command(&mut self, command: Command) {
        if command.tr() && command.stb1() {
            self.occupy_transmit_buffer();
            self.pending_transmission.set(Some(self.transmit_latency));
            if self.loopback {
                self.deliver(
                    self.get(Register::Tid1),
                    ((self.get(Register::Tfi1) >> 16) & 0xf) as u8,
                    self.get(Register::Tda1),
                    self.get(Register::Tdb1),
                );
            }
        }
        if command.rrb() {
            self.set(Register::Sr, self.get(Register::Sr) & !SR_RBS);
        }
    }
}

impl RegisterAccess for FakeRegisters {
    fn read(&self, register: Register) -> u32 {
        if register == Register::Sr {
            match self.pending_transmission.get() {
                Some(0) => {
                    self.pending_transmission.set(None);
                    self.set(Register::Sr, self.get(Register::Sr) | SR_TBS1 | SR_TCS1);
                }
                Some(remaining) => self.pending_transmission.set(Some(remaining - 1)),
                None => {}
            }
        }
        self.get(register)
    }

    fn write(&mut self, register: Register, value: u32) {
        self.writes.push((register, value));
        if register == Register::Cmr {
            self.command(Command(value));
        } else {
            self.set(register, value);
        }
    }
}
