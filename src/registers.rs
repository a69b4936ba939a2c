//! OctoQuad register tables, one per protocol revision.
//!
//! Every register has a fixed byte address, a width of 1, 2 or 4 bytes and a
//! signedness. Multi-byte registers are little-endian. Per-channel registers
//! are laid out back to back, so channel `i` of a block lives at
//! `base + i * width` and any run of channels can be fetched in one read.
//!
//! ```text
//!           Revision A                 Revision B
//! 0x00      CHIP_ID                    CHIP_ID
//! 0x01-03   FW MAJ/MIN/ENG             FW MAJ/MIN/ENG
//! 0x04      COMMAND                    COMMAND
//! 0x05-06   COMMAND_DAT_1..2           COMMAND_DAT_0..6 (0x05-0x0B)
//! 0x08      POSITION[0..7]   i32       -
//! 0x0C      -                          POSITION[0..7]   i32
//! 0x28      VELOCITY[0..7]   i16       -
//! 0x2C      -                          VELOCITY[0..7]   i16
//! 0x38      SAMPLE_INTVL[0..7] u8      -
//! ```

use crate::config::ProtocolRevision;

// ---------------------------------------------------------------------------
// Device constants
// ---------------------------------------------------------------------------

/// Default 7-bit I2C address of the OctoQuad.
pub const DEFAULT_ADDRESS: u8 = 0x30;

/// Value reported by the CHIP_ID register.
pub const CHIP_ID: u8 = 0x51;

/// Number of encoder channels.
pub const NUM_CHANNELS: usize = 8;

/// Highest valid channel index.
pub const CHANNEL_LAST: u8 = 7;

/// Channels per bank for [`ChannelBankConfig`](crate::ChannelBankConfig).
pub const CHANNELS_PER_BANK: usize = 4;

/// Settling time after a flash-save command.
pub const FLASH_SAVE_DELAY_MS: u32 = 100;

/// Largest contiguous span the driver ever transfers (positions + velocities).
pub(crate) const MAX_SPAN_LEN: usize = NUM_CHANNELS * 4 + NUM_CHANNELS * 2;

// ---------------------------------------------------------------------------
// Register descriptions
// ---------------------------------------------------------------------------

/// A single device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register {
    pub address: u8,
    pub width: u8,
    pub signed: bool,
}

impl Register {
    const fn byte(address: u8) -> Self {
        Self { address, width: 1, signed: false }
    }

    /// One past the last byte covered by this register.
    pub const fn end(&self) -> usize {
        self.address as usize + self.width as usize
    }
}

/// A contiguous byte range covering one or more registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterSpan {
    pub address: u8,
    pub len: usize,
}

impl RegisterSpan {
    /// Span from the first byte of `first` to the last byte of `last`.
    ///
    /// Returns `None` if `last` starts before `first`.
    pub fn between(first: Register, last: Register) -> Option<Self> {
        if last.address < first.address {
            return None;
        }
        Some(Self {
            address: first.address,
            len: last.end() - first.address as usize,
        })
    }
}

/// Fixed, non-channel fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    ChipId,
    FirmwareMajor,
    FirmwareMinor,
    FirmwareEngineering,
    Command,
    /// N-th parameter byte following COMMAND (0-based).
    ///
    /// Revision A names its two slots COMMAND_DAT_1 and COMMAND_DAT_2; they
    /// are `CommandData(0)` and `CommandData(1)` here.
    CommandData(u8),
}

/// Per-channel register families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelField {
    Position,
    Velocity,
    VelocitySampleInterval,
}

#[derive(Debug, Clone, Copy)]
struct ChannelBlock {
    base: u8,
    width: u8,
    signed: bool,
}

impl ChannelBlock {
    const fn register(&self, channel: u8) -> Register {
        Register {
            address: self.base + channel * self.width,
            width: self.width,
            signed: self.signed,
        }
    }
}

/// Opcodes understood by the COMMAND register.
///
/// Opcodes absent from a revision are `None`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommandSet {
    pub reset_everything: u8,
    pub reset_encoders: u8,
    pub set_directions: Option<u8>,
    pub set_i2c_recovery_mode: Option<u8>,
    pub set_param: Option<u8>,
    pub read_param: Option<u8>,
    pub write_params_to_flash: Option<u8>,
}

/// Parameter IDs for the revision B SET_PARAM / READ_PARAM commands.
pub(crate) mod param {
    pub const ENCODER_DIRECTIONS: u8 = 0;
    pub const I2C_RECOVERY_MODE: u8 = 1;
    pub const CHANNEL_BANK_CONFIG: u8 = 2;
    pub const CHANNEL_VEL_INTVL: u8 = 3;
    pub const CHANNEL_PULSE_WIDTH_MIN_MAX: u8 = 4;
}

/// Register and command table for one protocol revision.
#[derive(Debug)]
pub struct RegisterMap {
    revision: ProtocolRevision,
    firmware_major: u8,
    command: u8,
    command_data_len: u8,
    position: ChannelBlock,
    velocity: ChannelBlock,
    sample_interval: Option<ChannelBlock>,
    min_sample_interval: u16,
    pub(crate) commands: CommandSet,
}

/// Protocol revision A (firmware 1.x).
pub static REVISION_A: RegisterMap = RegisterMap {
    revision: ProtocolRevision::A,
    firmware_major: 1,
    command: 0x04,
    command_data_len: 2,
    position: ChannelBlock { base: 0x08, width: 4, signed: true },
    velocity: ChannelBlock { base: 0x28, width: 2, signed: true },
    sample_interval: Some(ChannelBlock { base: 0x38, width: 1, signed: false }),
    min_sample_interval: 0,
    commands: CommandSet {
        reset_everything: 1,
        reset_encoders: 2,
        set_directions: Some(3),
        set_i2c_recovery_mode: Some(4),
        set_param: None,
        read_param: None,
        write_params_to_flash: None,
    },
};

/// Protocol revision B (firmware 2.x).
pub static REVISION_B: RegisterMap = RegisterMap {
    revision: ProtocolRevision::B,
    firmware_major: 2,
    command: 0x04,
    command_data_len: 7,
    position: ChannelBlock { base: 0x0C, width: 4, signed: true },
    velocity: ChannelBlock { base: 0x2C, width: 2, signed: true },
    sample_interval: None,
    min_sample_interval: 1,
    commands: CommandSet {
        reset_everything: 20,
        reset_encoders: 21,
        set_directions: None,
        set_i2c_recovery_mode: None,
        set_param: Some(1),
        read_param: Some(2),
        write_params_to_flash: Some(3),
    },
};

impl RegisterMap {
    /// Table for the given revision.
    pub fn for_revision(revision: ProtocolRevision) -> &'static RegisterMap {
        match revision {
            ProtocolRevision::A => &REVISION_A,
            ProtocolRevision::B => &REVISION_B,
        }
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// Firmware major version this table was written for.
    pub fn firmware_major(&self) -> u8 {
        self.firmware_major
    }

    /// Smallest accepted velocity sample interval in milliseconds.
    pub fn min_sample_interval(&self) -> u16 {
        self.min_sample_interval
    }

    /// Number of parameter bytes that may follow an opcode.
    pub fn command_data_len(&self) -> u8 {
        self.command_data_len
    }

    /// Look up a fixed field. `None` if the revision does not have it.
    pub fn resolve(&self, field: Field) -> Option<Register> {
        let register = match field {
            Field::ChipId => Register::byte(0x00),
            Field::FirmwareMajor => Register::byte(0x01),
            Field::FirmwareMinor => Register::byte(0x02),
            Field::FirmwareEngineering => Register::byte(0x03),
            Field::Command => Register::byte(self.command),
            Field::CommandData(n) if n < self.command_data_len => Register::byte(self.command + 1 + n),
            Field::CommandData(_) => return None,
        };
        Some(register)
    }

    /// Look up the register of `family` for `channel`.
    ///
    /// `None` if the family does not exist in this revision or the channel is
    /// out of range.
    pub fn resolve_channel(&self, family: ChannelField, channel: u8) -> Option<Register> {
        if channel > CHANNEL_LAST {
            return None;
        }
        let block = match family {
            ChannelField::Position => self.position,
            ChannelField::Velocity => self.velocity,
            ChannelField::VelocitySampleInterval => self.sample_interval?,
        };
        Some(block.register(channel))
    }

    /// Span covering `family` registers for channels `first..=last`.
    pub fn channel_span(&self, family: ChannelField, first: u8, last: u8) -> Option<RegisterSpan> {
        let first = self.resolve_channel(family, first)?;
        let last = self.resolve_channel(family, last)?;
        RegisterSpan::between(first, last)
    }

    /// Span covering COMMAND plus `params` parameter bytes.
    pub fn command_span(&self, params: usize) -> Option<RegisterSpan> {
        let command = self.resolve(Field::Command)?;
        let last = match params {
            0 => command,
            n => self.resolve(Field::CommandData(u8::try_from(n - 1).ok()?))?,
        };
        RegisterSpan::between(command, last)
    }
}

// ---------------------------------------------------------------------------
// Little-endian field codecs
// ---------------------------------------------------------------------------

pub(crate) fn decode_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn decode_i16(bytes: &[u8]) -> i16 {
    i16::from_le_bytes([bytes[0], bytes[1]])
}

pub(crate) fn decode_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}
