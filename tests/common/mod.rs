//! Recording in-memory register bus shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_futures::block_on;
use octoquad_driver::{DriverConfig, OctoQuad, ProtocolRevision, RegisterBus, CHIP_ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Read { address: u8, len: usize },
    Write { address: u8, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

/// Register file the driver reads from. Writes are only logged, so values
/// staged in the command data registers survive the READ_PARAM write.
pub struct Board {
    pub regs: [u8; 256],
    pub log: Vec<Transaction>,
    pub fail: bool,
    /// Fail the next read at this address, once.
    pub fail_read_once: Option<u8>,
}

impl Board {
    pub fn put(&mut self, address: u8, bytes: &[u8]) {
        let start = address as usize;
        self.regs[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

/// Cloneable handle: the driver owns one clone, the test inspects another.
#[derive(Clone)]
pub struct MockBus(Rc<RefCell<Board>>);

impl MockBus {
    pub fn blank() -> Self {
        Self(Rc::new(RefCell::new(Board {
            regs: [0u8; 256],
            log: Vec::new(),
            fail: false,
            fail_read_once: None,
        })))
    }

    /// Board that passes the identity check for `revision`.
    pub fn healthy(revision: ProtocolRevision) -> Self {
        let bus = Self::blank();
        let major = match revision {
            ProtocolRevision::A => 1,
            ProtocolRevision::B => 2,
        };
        bus.put(0x00, &[CHIP_ID, major, 3, 0]);
        bus
    }

    pub fn put(&self, address: u8, bytes: &[u8]) {
        self.0.borrow_mut().put(address, bytes);
    }

    pub fn set_fail(&self, fail: bool) {
        self.0.borrow_mut().fail = fail;
    }

    pub fn fail_next_read_at(&self, address: u8) {
        self.0.borrow_mut().fail_read_once = Some(address);
    }

    pub fn log(&self) -> Vec<Transaction> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn reads(&self) -> Vec<Transaction> {
        self.log()
            .into_iter()
            .filter(|t| matches!(t, Transaction::Read { .. }))
            .collect()
    }

    pub fn writes(&self) -> Vec<Transaction> {
        self.log()
            .into_iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .collect()
    }
}

impl RegisterBus for MockBus {
    type Error = BusFault;

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut board = self.0.borrow_mut();
        board.log.push(Transaction::Read { address, len: buf.len() });
        if board.fail_read_once == Some(address) {
            board.fail_read_once = None;
            return Err(BusFault);
        }
        if board.fail {
            return Err(BusFault);
        }
        let start = address as usize;
        buf.copy_from_slice(&board.regs[start..start + buf.len()]);
        Ok(())
    }

    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut board = self.0.borrow_mut();
        board.log.push(Transaction::Write { address, bytes: bytes.to_vec() });
        if board.fail {
            return Err(BusFault);
        }
        Ok(())
    }
}

/// Driver for `revision` over `bus`, unverified.
pub fn driver(bus: &MockBus, revision: ProtocolRevision) -> OctoQuad<MockBus> {
    OctoQuad::with_bus(bus.clone(), DriverConfig::for_revision(revision))
}

/// Driver over `bus` that has already passed verification, with the
/// identity reads cleared from the log.
pub fn verified(bus: &MockBus, revision: ProtocolRevision) -> OctoQuad<MockBus> {
    let mut octoquad = driver(bus, revision);
    block_on(octoquad.verify()).unwrap();
    bus.clear_log();
    octoquad
}

pub fn write(address: u8, bytes: &[u8]) -> Transaction {
    Transaction::Write { address, bytes: bytes.to_vec() }
}

pub fn read(address: u8, len: usize) -> Transaction {
    Transaction::Read { address, len }
}
