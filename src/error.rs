//! Error types for the OctoQuad driver.

use core::fmt;

use crate::config::ProtocolRevision;
use crate::types::FirmwareVersion;

/// Errors that can occur when talking to the OctoQuad.
///
/// `E` is the error type of the underlying [`RegisterBus`](crate::RegisterBus).
/// Every variant except [`Bus`](Self::Bus) is raised before the offending
/// transaction is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OctoQuadError<E> {
    /// Underlying bus error, passed through untouched.
    Bus(E),

    /// Channel index outside 0-7.
    InvalidChannel(u8),

    /// Channel range with `first > last` or an end outside 0-7.
    InvalidChannelRange { first: u8, last: u8 },

    /// Velocity sample interval outside the revision's accepted range.
    InvalidSampleInterval(u16),

    /// Pulse-width limits of zero, or with `max <= min`.
    InvalidPulseWidth { min: u16, max: u16 },

    /// Payload length does not match the register span it targets.
    LengthMismatch { expected: usize, actual: usize },

    /// Register pair whose last register starts before the first.
    InvalidRegisterSpan { first: u8, last: u8 },

    /// CHIP_ID register did not hold the OctoQuad identity byte.
    ChipIdMismatch { expected: u8, found: u8 },

    /// Board runs a firmware major version this register map was not built for.
    FirmwareMismatch { expected: u8, found: FirmwareVersion },

    /// The operation has no encoding in the selected protocol revision.
    Unsupported(ProtocolRevision),
}

// Allow ergonomic `?` propagation from raw bus errors.
impl<E> From<E> for OctoQuadError<E> {
    fn from(error: E) -> Self {
        OctoQuadError::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for OctoQuadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OctoQuadError::Bus(e) => write!(f, "bus error: {:?}", e),
            OctoQuadError::InvalidChannel(ch) => {
                write!(f, "invalid channel {} (must be 0-7)", ch)
            }
            OctoQuadError::InvalidChannelRange { first, last } => {
                write!(f, "invalid channel range {}..={}", first, last)
            }
            OctoQuadError::InvalidSampleInterval(ms) => {
                write!(f, "velocity sample interval {} ms out of range", ms)
            }
            OctoQuadError::InvalidPulseWidth { min, max } => {
                write!(f, "invalid pulse width limits min={} max={} (us)", min, max)
            }
            OctoQuadError::LengthMismatch { expected, actual } => {
                write!(f, "register span is {} bytes, payload is {}", expected, actual)
            }
            OctoQuadError::InvalidRegisterSpan { first, last } => write!(
                f,
                "register 0x{:02X} lies before 0x{:02X}, no span between them",
                last, first
            ),
            OctoQuadError::ChipIdMismatch { expected, found } => write!(
                f,
                "OctoQuad does not report correct CHIP_ID; got 0x{:02X}, expected 0x{:02X}",
                found, expected
            ),
            OctoQuadError::FirmwareMismatch { expected, found } => write!(
                f,
                "OctoQuad firmware {} does not match supported major version {}",
                found, expected
            ),
            OctoQuadError::Unsupported(rev) => {
                write!(f, "operation not supported by protocol revision {:?}", rev)
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for OctoQuadError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            OctoQuadError::Bus(e) => defmt::write!(f, "Bus error: {}", e),
            OctoQuadError::InvalidChannel(ch) => defmt::write!(f, "Invalid channel {}", ch),
            OctoQuadError::InvalidChannelRange { first, last } => {
                defmt::write!(f, "Invalid channel range {}..={}", first, last)
            }
            OctoQuadError::InvalidSampleInterval(ms) => {
                defmt::write!(f, "Invalid sample interval {} ms", ms)
            }
            OctoQuadError::InvalidPulseWidth { min, max } => {
                defmt::write!(f, "Invalid pulse width min={} max={}", min, max)
            }
            OctoQuadError::LengthMismatch { expected, actual } => {
                defmt::write!(f, "Length mismatch: expected {}, got {}", expected, actual)
            }
            OctoQuadError::InvalidRegisterSpan { first, last } => {
                defmt::write!(f, "Invalid register span {:#x}..{:#x}", first, last)
            }
            OctoQuadError::ChipIdMismatch { expected, found } => {
                defmt::write!(f, "CHIP_ID mismatch: got {:#x}, expected {:#x}", found, expected)
            }
            OctoQuadError::FirmwareMismatch { expected, found } => {
                defmt::write!(f, "Firmware {} incompatible (expected major {})", found, expected)
            }
            OctoQuadError::Unsupported(rev) => {
                defmt::write!(f, "Unsupported by revision {}", rev)
            }
        }
    }
}
