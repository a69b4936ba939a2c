//! Async driver for the OctoQuad 8-channel encoder interface.
//!
//! The OctoQuad reads eight quadrature encoders (or absolute encoders with a
//! pulse-width output) and exposes counts and velocities as little-endian
//! registers over I2C. This crate maps those registers and the board's
//! command protocol onto a typed async API that works with any
//! `embedded-hal-async` I2C implementation.
//!
//! # Architecture
//!
//! - **[`registers`]** — register tables for protocol revisions A (firmware
//!   1.x) and B (firmware 2.x): addresses, widths, opcodes.
//! - **[`RegisterBus`]** — the two bus primitives the driver needs. [`I2cBus`]
//!   implements it for real hardware; tests can plug in a stub.
//! - **[`OctoQuad`]** (public) — validated operations. Each one checks its
//!   arguments, runs the one-time identity check, then issues its
//!   transactions.
//!
//! # Quick start
//!
//! ```no_run
//! use octoquad_driver::{ChannelBankConfig, OctoQuad};
//!
//! # async fn example(i2c: impl embedded_hal_async::i2c::I2c) -> Result<(), ()> {
//! let mut octoquad = OctoQuad::new(i2c);
//!
//! octoquad.set_channel_bank_config(ChannelBankConfig::AllQuadrature).await.map_err(|_| ())?;
//! octoquad.set_direction(1, true).await.map_err(|_| ())?;
//!
//! let data = octoquad.read_all_encoder_data().await.map_err(|_| ())?;
//! # let _ = data;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **`defmt`** — Enable [`defmt::Format`] implementations on public types
//!   and log verification results.

#![cfg_attr(not(test), no_std)]

pub use bus::{I2cBus, RegisterBus};
pub use config::{DriverConfig, MismatchPolicy, ProtocolRevision};
pub use error::OctoQuadError;
pub use octoquad::{OctoQuad, VerificationState};
pub use registers::{CHIP_ID, DEFAULT_ADDRESS, FLASH_SAVE_DELAY_MS, NUM_CHANNELS};
pub use types::{
    ChannelBankConfig, EncoderDataBlock, FirmwareVersion, I2cRecoveryMode, PulseWidthParams,
    Readback, VerificationWarning,
};

mod bus;
mod config;
mod error;
mod frame;
mod octoquad;
pub mod registers;
mod types;
