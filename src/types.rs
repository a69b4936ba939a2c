//! Value types exchanged with the OctoQuad.

use core::fmt;

use crate::registers::NUM_CHANNELS;

/// Firmware version reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub engineering: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.engineering)
    }
}

/// Positions and velocities of all eight channels from one bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderDataBlock {
    /// Quadrature counts, or pulse width in microseconds for channels in
    /// pulse-width mode.
    pub positions: [i32; NUM_CHANNELS],
    /// Change per velocity sample interval.
    pub velocities: [i16; NUM_CHANNELS],
}

/// Input mode of the two four-channel banks (bank 1 = channels 0-3,
/// bank 2 = channels 4-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelBankConfig {
    #[default]
    AllQuadrature,
    AllPulseWidth,
    Bank1QuadratureBank2PulseWidth,
}

impl ChannelBankConfig {
    pub fn code(self) -> u8 {
        match self {
            ChannelBankConfig::AllQuadrature => 0,
            ChannelBankConfig::AllPulseWidth => 1,
            ChannelBankConfig::Bank1QuadratureBank2PulseWidth => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ChannelBankConfig::AllQuadrature),
            1 => Some(ChannelBankConfig::AllPulseWidth),
            2 => Some(ChannelBankConfig::Bank1QuadratureBank2PulseWidth),
            _ => None,
        }
    }
}

/// How the board tries to recover a wedged I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cRecoveryMode {
    /// No recovery attempts.
    #[default]
    None,
    /// Reset the I2C peripheral if 50 ms pass between bytes or between bytes
    /// and start/stop conditions.
    PeripheralResetOnFrameError,
    /// As above, plus toggle SCL once after 1500 ms without traffic.
    ResetPlusSclIdleToggle,
}

impl I2cRecoveryMode {
    pub fn code(self) -> u8 {
        match self {
            I2cRecoveryMode::None => 0,
            I2cRecoveryMode::PeripheralResetOnFrameError => 1,
            I2cRecoveryMode::ResetPlusSclIdleToggle => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(I2cRecoveryMode::None),
            1 => Some(I2cRecoveryMode::PeripheralResetOnFrameError),
            2 => Some(I2cRecoveryMode::ResetPlusSclIdleToggle),
            _ => None,
        }
    }
}

/// Expected pulse-width range of an absolute encoder, in microseconds.
///
/// The firmware uses it to unwrap velocity across the rollover point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseWidthParams {
    pub min_us: u16,
    pub max_us: u16,
}

impl PulseWidthParams {
    pub fn new(min_us: u16, max_us: u16) -> Self {
        Self { min_us, max_us }
    }

    /// Both bounds in 1..=65535 and `max_us > min_us`.
    pub fn is_valid(&self) -> bool {
        self.min_us >= 1 && self.max_us > self.min_us
    }
}

/// An enumerated setting read back from the board.
///
/// Unknown codes decode to the type's default; the raw byte is kept in
/// `unrecognized` so the caller can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Readback<T> {
    pub value: T,
    pub unrecognized: Option<u8>,
}

impl<T: Default> Readback<T> {
    pub(crate) fn decode(raw: u8, from_code: impl FnOnce(u8) -> Option<T>) -> Self {
        match from_code(raw) {
            Some(value) => Self { value, unrecognized: None },
            None => Self { value: T::default(), unrecognized: Some(raw) },
        }
    }
}

impl<T> Readback<T> {
    pub fn is_recognized(&self) -> bool {
        self.unrecognized.is_none()
    }
}

/// Mismatch recorded by the verification gate under
/// [`MismatchPolicy::Warn`](crate::MismatchPolicy::Warn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VerificationWarning {
    ChipId { expected: u8, found: u8 },
    Firmware { expected_major: u8, found: FirmwareVersion },
}

impl fmt::Display for VerificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerificationWarning::ChipId { expected, found } => write!(
                f,
                "CHIP_ID 0x{:02X} (expected 0x{:02X}); I2C comms are likely not working",
                found, expected
            ),
            VerificationWarning::Firmware { expected_major, found } => write!(
                f,
                "firmware {} differs from supported major version {}",
                found, expected_major
            ),
        }
    }
}
