//! Register bus abstraction and its I2C implementation.
//!
//! The driver only needs two primitives: read a run of registers and write a
//! run of registers. [`RegisterBus`] captures exactly that, so the protocol
//! layer can be exercised without hardware and can sit on any transport.
//! [`I2cBus`] is the implementation for real boards.

use embedded_hal_async::i2c::{I2c, Operation};

use crate::registers::DEFAULT_ADDRESS;

/// Addressed register reads and writes on a single device.
#[allow(async_fn_in_trait)]
pub trait RegisterBus {
    type Error: core::fmt::Debug;

    /// Read `buf.len()` bytes starting at register `address`.
    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `bytes` to consecutive registers starting at `address`.
    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// [`RegisterBus`] over an `embedded-hal-async` I2C peripheral.
///
/// Owns the peripheral and the board's 7-bit address.
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cBus<I2C>
where
    I2C: I2c,
{
    /// # Arguments
    /// * `i2c` — I2C peripheral (takes ownership for exclusive access)
    /// * `address` — 7-bit I2C device address (typically 0x30)
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Bus at [`DEFAULT_ADDRESS`].
    pub fn with_default_address(i2c: I2C) -> Self {
        Self::new(i2c, DEFAULT_ADDRESS)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the peripheral back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> RegisterBus for I2cBus<I2C>
where
    I2C: I2c,
{
    type Error = I2C::Error;

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[address], buf).await
    }

    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        // Adjacent writes go out as one frame with no repeated start, so the
        // board sees [address, bytes...] exactly as a single buffer.
        self.i2c
            .transaction(
                self.address,
                &mut [Operation::Write(&[address]), Operation::Write(bytes)],
            )
            .await
    }
}
