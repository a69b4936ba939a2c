//! High-level interface for the OctoQuad encoder interface board.
//!
//! [`OctoQuad`] turns typed operations into register transactions against
//! the [`RegisterMap`] of the configured protocol revision, and checks the
//! board's identity once per session before trusting any data.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use heapless::Vec;

use crate::bus::{I2cBus, RegisterBus};
use crate::config::{DriverConfig, MismatchPolicy, ProtocolRevision};
use crate::error::OctoQuadError;
use crate::frame::{channel_mask, mask_to_flags, CommandFrame};
use crate::registers::{
    decode_i16, decode_i32, decode_u16, param, ChannelField, Field, Register, RegisterMap,
    RegisterSpan, CHANNEL_LAST, CHIP_ID, FLASH_SAVE_DELAY_MS, MAX_SPAN_LEN, NUM_CHANNELS,
};
use crate::types::{
    ChannelBankConfig, EncoderDataBlock, FirmwareVersion, I2cRecoveryMode, PulseWidthParams,
    Readback, VerificationWarning,
};

/// Largest accepted velocity sample interval in milliseconds.
const MAX_SAMPLE_INTERVAL: u16 = 255;

/// Session verification state. Moves from `Unverified` to `Verified` once
/// and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VerificationState {
    Unverified,
    Verified,
}

/// Per-session state. Everything else the driver does is a stateless
/// register transaction.
#[derive(Debug)]
struct Session {
    state: VerificationState,
    /// Last direction mask sent to (or read from) the board, bit `i` set
    /// when channel `i` counts in reverse.
    direction_mask: u8,
    warnings: Vec<VerificationWarning, 2>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: VerificationState::Unverified,
            direction_mask: 0,
            warnings: Vec::new(),
        }
    }
}

/// Driver for the OctoQuad 8-channel encoder interface.
///
/// Every operation validates its arguments first, then runs the one-time
/// identity check, then issues its transactions. Invalid arguments therefore
/// never cause bus traffic.
///
/// # Example
///
/// ```no_run
/// use octoquad_driver::OctoQuad;
///
/// # async fn example(i2c: impl embedded_hal_async::i2c::I2c) {
/// let mut octoquad = OctoQuad::new(i2c);
///
/// // One bus transaction for all eight channels.
/// let data = octoquad.read_all_encoder_data().await.unwrap();
/// let left = data.positions[0];
/// # }
/// ```
pub struct OctoQuad<B> {
    bus: B,
    map: &'static RegisterMap,
    policy: MismatchPolicy,
    session: Session,
}

impl<I2C> OctoQuad<I2cBus<I2C>>
where
    I2C: I2c,
{
    /// Driver on `i2c` at the default address, speaking revision B.
    pub fn new(i2c: I2C) -> Self {
        Self::with_bus(I2cBus::with_default_address(i2c), DriverConfig::default())
    }
}

impl<B> OctoQuad<B>
where
    B: RegisterBus,
{
    /// Driver over any register bus.
    ///
    /// No bus traffic is generated until the first operation.
    pub fn with_bus(bus: B, config: DriverConfig) -> Self {
        Self {
            bus,
            map: RegisterMap::for_revision(config.revision),
            policy: config.mismatch_policy,
            session: Session::new(),
        }
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.map.revision()
    }

    pub fn register_map(&self) -> &'static RegisterMap {
        self.map
    }

    /// Give the bus back, ending the session.
    pub fn release(self) -> B {
        self.bus
    }

    // -----------------------------------------------------------------------
    // Identity and verification
    // -----------------------------------------------------------------------

    /// Read the CHIP_ID register. Does not go through the verification gate.
    pub async fn chip_id(&mut self) -> Result<u8, OctoQuadError<B::Error>> {
        let register = self.field(Field::ChipId)?;
        let mut buf = [0u8; 1];
        let bytes = self.read_register(register, &mut buf).await?;
        Ok(bytes[0])
    }

    /// Read the firmware version. Does not go through the verification gate.
    pub async fn firmware_version(&mut self) -> Result<FirmwareVersion, OctoQuadError<B::Error>> {
        let first = self.field(Field::FirmwareMajor)?;
        let last = self.field(Field::FirmwareEngineering)?;
        let span = self.span(first, last)?;

        let mut buf = [0u8; 3];
        let bytes = self.read_span(span, &mut buf).await?;
        Ok(FirmwareVersion {
            major: bytes[0],
            minor: bytes[1],
            engineering: bytes[2],
        })
    }

    /// Check chip identity and firmware major version, once per session.
    ///
    /// Every other operation calls this before touching the bus, so calling
    /// it directly is only needed to surface problems early. After the first
    /// success it returns immediately without bus traffic.
    ///
    /// Under [`MismatchPolicy::Fail`] a mismatch is returned as an error and
    /// the session stays unverified. Under [`MismatchPolicy::Warn`] it is
    /// recorded in [`warnings()`](Self::warnings) and the session is verified
    /// anyway.
    pub async fn verify(&mut self) -> Result<(), OctoQuadError<B::Error>> {
        if self.session.state == VerificationState::Verified {
            return Ok(());
        }

        // Warnings are committed only once both checks have run.
        let found = self.chip_id().await?;
        let chip_warning = if found != CHIP_ID {
            Some(self.mismatch(VerificationWarning::ChipId { expected: CHIP_ID, found })?)
        } else {
            None
        };

        let version = self.firmware_version().await?;
        let expected_major = self.map.firmware_major();
        let firmware_warning = if version.major != expected_major {
            Some(self.mismatch(VerificationWarning::Firmware { expected_major, found: version })?)
        } else {
            None
        };

        self.session.warnings = chip_warning.into_iter().chain(firmware_warning).collect();
        self.session.state = VerificationState::Verified;
        #[cfg(feature = "defmt")]
        defmt::debug!("OctoQuad verified, firmware {}", version);
        Ok(())
    }

    pub fn verification_state(&self) -> VerificationState {
        self.session.state
    }

    pub fn is_verified(&self) -> bool {
        self.session.state == VerificationState::Verified
    }

    /// Mismatches tolerated under [`MismatchPolicy::Warn`].
    pub fn warnings(&self) -> &[VerificationWarning] {
        &self.session.warnings
    }

    /// Apply the mismatch policy: an error under `Fail`, the warning to
    /// record under `Warn`.
    fn mismatch(
        &self,
        warning: VerificationWarning,
    ) -> Result<VerificationWarning, OctoQuadError<B::Error>> {
        match self.policy {
            MismatchPolicy::Fail => {
                #[cfg(feature = "defmt")]
                defmt::error!("OctoQuad verification failed: {}", warning);
                Err(match warning {
                    VerificationWarning::ChipId { expected, found } => {
                        OctoQuadError::ChipIdMismatch { expected, found }
                    }
                    VerificationWarning::Firmware { expected_major, found } => {
                        OctoQuadError::FirmwareMismatch { expected: expected_major, found }
                    }
                })
            }
            MismatchPolicy::Warn => {
                #[cfg(feature = "defmt")]
                defmt::warn!("OctoQuad verification: {}", warning);
                Ok(warning)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------------

    /// Read the position of one channel.
    ///
    /// Quadrature count, or pulse width in microseconds for a channel in
    /// pulse-width mode.
    ///
    /// # Errors
    /// * [`OctoQuadError::InvalidChannel`] if `channel > 7`
    /// * [`OctoQuadError::Bus`] on communication failure
    pub async fn read_position(&mut self, channel: u8) -> Result<i32, OctoQuadError<B::Error>> {
        let register = self.channel_register(ChannelField::Position, channel)?;
        self.verify().await?;

        let mut buf = [0u8; 4];
        let bytes = self.read_register(register, &mut buf).await?;
        Ok(decode_i32(bytes))
    }

    /// Read positions of channels `first..=last` in one transaction.
    ///
    /// The result is in channel order and has `last - first + 1` entries.
    pub async fn read_position_range(
        &mut self,
        first: u8,
        last: u8,
    ) -> Result<Vec<i32, NUM_CHANNELS>, OctoQuadError<B::Error>> {
        let span = self.channel_span(ChannelField::Position, first, last)?;
        self.verify().await?;

        let mut buf = [0u8; MAX_SPAN_LEN];
        let bytes = self.read_span(span, &mut buf).await?;
        Ok(bytes.chunks_exact(4).map(decode_i32).collect())
    }

    /// Read all eight positions in one transaction.
    pub async fn read_all_positions(
        &mut self,
    ) -> Result<[i32; NUM_CHANNELS], OctoQuadError<B::Error>> {
        let span = self.channel_span(ChannelField::Position, 0, CHANNEL_LAST)?;
        self.verify().await?;

        let mut buf = [0u8; MAX_SPAN_LEN];
        let bytes = self.read_span(span, &mut buf).await?;
        let mut positions = [0i32; NUM_CHANNELS];
        for (slot, chunk) in positions.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = decode_i32(chunk);
        }
        Ok(positions)
    }

    // -----------------------------------------------------------------------
    // Velocities
    // -----------------------------------------------------------------------

    /// Read the velocity of one channel, in counts (or microseconds) per
    /// velocity sample interval.
    pub async fn read_velocity(&mut self, channel: u8) -> Result<i16, OctoQuadError<B::Error>> {
        let register = self.channel_register(ChannelField::Velocity, channel)?;
        self.verify().await?;

        let mut buf = [0u8; 2];
        let bytes = self.read_register(register, &mut buf).await?;
        Ok(decode_i16(bytes))
    }

    /// Read velocities of channels `first..=last` in one transaction.
    pub async fn read_velocity_range(
        &mut self,
        first: u8,
        last: u8,
    ) -> Result<Vec<i16, NUM_CHANNELS>, OctoQuadError<B::Error>> {
        let span = self.channel_span(ChannelField::Velocity, first, last)?;
        self.verify().await?;

        let mut buf = [0u8; MAX_SPAN_LEN];
        let bytes = self.read_span(span, &mut buf).await?;
        Ok(bytes.chunks_exact(2).map(decode_i16).collect())
    }

    /// Read all eight velocities in one transaction.
    pub async fn read_all_velocities(
        &mut self,
    ) -> Result<[i16; NUM_CHANNELS], OctoQuadError<B::Error>> {
        let span = self.channel_span(ChannelField::Velocity, 0, CHANNEL_LAST)?;
        self.verify().await?;

        let mut buf = [0u8; MAX_SPAN_LEN];
        let bytes = self.read_span(span, &mut buf).await?;
        let mut velocities = [0i16; NUM_CHANNELS];
        for (slot, chunk) in velocities.iter_mut().zip(bytes.chunks_exact(2)) {
            *slot = decode_i16(chunk);
        }
        Ok(velocities)
    }

    /// Read every position and velocity in a single transaction.
    ///
    /// The velocity block directly follows the position block, so one read
    /// covers both. Use this in a control loop instead of two bulk reads.
    pub async fn read_all_encoder_data(
        &mut self,
    ) -> Result<EncoderDataBlock, OctoQuadError<B::Error>> {
        let first = self.channel_register(ChannelField::Position, 0)?;
        let last = self.channel_register(ChannelField::Velocity, CHANNEL_LAST)?;
        let span = self.span(first, last)?;
        self.verify().await?;

        let mut buf = [0u8; MAX_SPAN_LEN];
        let bytes = self.read_span(span, &mut buf).await?;
        let (position_bytes, velocity_bytes) = bytes.split_at(NUM_CHANNELS * 4);

        let mut block = EncoderDataBlock::default();
        for (slot, chunk) in block.positions.iter_mut().zip(position_bytes.chunks_exact(4)) {
            *slot = decode_i32(chunk);
        }
        for (slot, chunk) in block.velocities.iter_mut().zip(velocity_bytes.chunks_exact(2)) {
            *slot = decode_i16(chunk);
        }
        Ok(block)
    }

    // -----------------------------------------------------------------------
    // Position reset
    // -----------------------------------------------------------------------

    /// Reset the position of one channel to zero.
    pub async fn reset_position(&mut self, channel: u8) -> Result<(), OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        self.reset_mask(1 << channel).await
    }

    /// Reset the positions of the listed channels with one command.
    ///
    /// Every index is validated before anything is sent. An empty list sends
    /// nothing.
    pub async fn reset_positions(&mut self, channels: &[u8]) -> Result<(), OctoQuadError<B::Error>> {
        let mut mask = 0u8;
        for &channel in channels {
            mask |= 1 << Self::check_channel(channel)?;
        }
        self.reset_mask(mask).await
    }

    /// Reset the positions of every channel whose flag is set. Sends nothing
    /// if no flag is set.
    pub async fn reset_selected_positions(
        &mut self,
        selected: &[bool; NUM_CHANNELS],
    ) -> Result<(), OctoQuadError<B::Error>> {
        self.reset_mask(channel_mask(selected)).await
    }

    /// Reset all eight positions to zero.
    pub async fn reset_all_positions(&mut self) -> Result<(), OctoQuadError<B::Error>> {
        self.reset_mask(0xFF).await
    }

    async fn reset_mask(&mut self, mask: u8) -> Result<(), OctoQuadError<B::Error>> {
        // Nothing selected: a zero mask would be a no-op on the board.
        if mask == 0 {
            return Ok(());
        }
        let frame = CommandFrame::new(self.map.commands.reset_encoders).param(mask);
        self.verify().await?;
        self.send(&frame).await
    }

    // -----------------------------------------------------------------------
    // Direction
    // -----------------------------------------------------------------------

    /// Direction mask most recently written to or read from the board.
    ///
    /// No bus traffic.
    pub fn direction_mask(&self) -> u8 {
        self.session.direction_mask
    }

    /// Set the count direction of one channel.
    ///
    /// The board takes the whole direction byte at once, so the cached mask
    /// is updated for this channel and sent in full.
    pub async fn set_direction(
        &mut self,
        channel: u8,
        reversed: bool,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        let bit = 1u8 << channel;
        let mask = if reversed {
            self.session.direction_mask | bit
        } else {
            self.session.direction_mask & !bit
        };
        self.write_direction_mask(mask).await
    }

    /// Replace the direction of every channel.
    pub async fn set_all_directions(
        &mut self,
        reversed: &[bool; NUM_CHANNELS],
    ) -> Result<(), OctoQuadError<B::Error>> {
        self.write_direction_mask(channel_mask(reversed)).await
    }

    async fn write_direction_mask(&mut self, mask: u8) -> Result<(), OctoQuadError<B::Error>> {
        let frame = match self.map.revision() {
            ProtocolRevision::A => {
                CommandFrame::new(self.opcode(self.map.commands.set_directions)?).param(mask)
            }
            ProtocolRevision::B => self.set_param(param::ENCODER_DIRECTIONS)?.param(mask),
        };
        self.verify().await?;
        self.send(&frame).await?;
        self.session.direction_mask = mask;
        Ok(())
    }

    /// Read back whether one channel is reversed. Revision B only.
    pub async fn get_direction(&mut self, channel: u8) -> Result<bool, OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        let flags = self.get_all_directions().await?;
        Ok(flags[channel as usize])
    }

    /// Read back the direction of every channel. Revision B only.
    ///
    /// Also refreshes the cached direction mask.
    pub async fn get_all_directions(
        &mut self,
    ) -> Result<[bool; NUM_CHANNELS], OctoQuadError<B::Error>> {
        let frame = self.read_param(param::ENCODER_DIRECTIONS)?;
        self.verify().await?;

        let mut buf = [0u8; 1];
        let bytes = self.query(&frame, &mut buf).await?;
        self.session.direction_mask = bytes[0];
        Ok(mask_to_flags(bytes[0]))
    }

    // -----------------------------------------------------------------------
    // Velocity sample interval
    // -----------------------------------------------------------------------

    /// Set the velocity sample interval of one channel, in milliseconds.
    ///
    /// # Errors
    /// * [`OctoQuadError::InvalidSampleInterval`] outside 1-255 (0-255 on
    ///   revision A)
    pub async fn set_velocity_sample_interval(
        &mut self,
        channel: u8,
        ms: u16,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        let ms = self.check_interval(ms)?;

        match self.map.revision() {
            ProtocolRevision::A => {
                let register =
                    self.channel_register(ChannelField::VelocitySampleInterval, channel)?;
                self.verify().await?;
                self.write_register(register, &[ms]).await
            }
            ProtocolRevision::B => {
                let frame = self.set_param(param::CHANNEL_VEL_INTVL)?.param(channel).param(ms);
                self.verify().await?;
                self.send(&frame).await
            }
        }
    }

    /// Set every channel's velocity sample interval to `ms`.
    pub async fn set_all_velocity_sample_intervals(
        &mut self,
        ms: u16,
    ) -> Result<(), OctoQuadError<B::Error>> {
        self.set_velocity_sample_intervals(&[ms; NUM_CHANNELS]).await
    }

    /// Set each channel's velocity sample interval.
    ///
    /// All entries are validated before the first write. Revision A writes
    /// the eight interval registers in one transaction; revision B sends one
    /// command per channel.
    pub async fn set_velocity_sample_intervals(
        &mut self,
        intervals: &[u16; NUM_CHANNELS],
    ) -> Result<(), OctoQuadError<B::Error>> {
        let mut bytes = [0u8; NUM_CHANNELS];
        for (byte, &ms) in bytes.iter_mut().zip(intervals.iter()) {
            *byte = self.check_interval(ms)?;
        }

        match self.map.revision() {
            ProtocolRevision::A => {
                let span =
                    self.channel_span(ChannelField::VelocitySampleInterval, 0, CHANNEL_LAST)?;
                self.verify().await?;
                self.write_span(span, &bytes).await
            }
            ProtocolRevision::B => {
                let opcode = self.opcode(self.map.commands.set_param)?;
                self.verify().await?;
                for (channel, &ms) in (0u8..).zip(bytes.iter()) {
                    let frame = CommandFrame::new(opcode)
                        .param(param::CHANNEL_VEL_INTVL)
                        .param(channel)
                        .param(ms);
                    self.send(&frame).await?;
                }
                Ok(())
            }
        }
    }

    /// Read the velocity sample interval of one channel, in milliseconds.
    pub async fn get_velocity_sample_interval(
        &mut self,
        channel: u8,
    ) -> Result<u8, OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;

        match self.map.revision() {
            ProtocolRevision::A => {
                let register =
                    self.channel_register(ChannelField::VelocitySampleInterval, channel)?;
                self.verify().await?;
                let mut buf = [0u8; 1];
                let bytes = self.read_register(register, &mut buf).await?;
                Ok(bytes[0])
            }
            ProtocolRevision::B => {
                let frame = self.read_param(param::CHANNEL_VEL_INTVL)?.param(channel);
                self.verify().await?;
                let mut buf = [0u8; 1];
                let bytes = self.query(&frame, &mut buf).await?;
                Ok(bytes[0])
            }
        }
    }

    /// Read every channel's velocity sample interval.
    pub async fn get_all_velocity_sample_intervals(
        &mut self,
    ) -> Result<[u8; NUM_CHANNELS], OctoQuadError<B::Error>> {
        let mut intervals = [0u8; NUM_CHANNELS];

        match self.map.revision() {
            ProtocolRevision::A => {
                let span =
                    self.channel_span(ChannelField::VelocitySampleInterval, 0, CHANNEL_LAST)?;
                self.verify().await?;
                self.read_span(span, &mut intervals).await?;
                Ok(intervals)
            }
            ProtocolRevision::B => {
                let opcode = self.opcode(self.map.commands.read_param)?;
                self.verify().await?;
                for (channel, slot) in (0u8..).zip(intervals.iter_mut()) {
                    let frame = CommandFrame::new(opcode)
                        .param(param::CHANNEL_VEL_INTVL)
                        .param(channel);
                    let mut buf = [0u8; 1];
                    let bytes = self.query(&frame, &mut buf).await?;
                    *slot = bytes[0];
                }
                Ok(intervals)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Channel banks and pulse width (revision B)
    // -----------------------------------------------------------------------

    /// Select quadrature or pulse-width input per bank.
    pub async fn set_channel_bank_config(
        &mut self,
        config: ChannelBankConfig,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let frame = self.set_param(param::CHANNEL_BANK_CONFIG)?.param(config.code());
        self.verify().await?;
        self.send(&frame).await
    }

    /// Read the bank configuration. Unknown codes read as
    /// [`ChannelBankConfig::AllQuadrature`] with the raw code attached.
    pub async fn get_channel_bank_config(
        &mut self,
    ) -> Result<Readback<ChannelBankConfig>, OctoQuadError<B::Error>> {
        let frame = self.read_param(param::CHANNEL_BANK_CONFIG)?;
        self.verify().await?;

        let mut buf = [0u8; 1];
        let bytes = self.query(&frame, &mut buf).await?;
        Ok(Readback::decode(bytes[0], ChannelBankConfig::from_code))
    }

    /// Set the expected pulse-width range of an absolute encoder on `channel`.
    ///
    /// # Errors
    /// * [`OctoQuadError::InvalidPulseWidth`] if `min_us` is zero or
    ///   `max_us <= min_us`
    pub async fn set_pulse_width_params(
        &mut self,
        channel: u8,
        params: PulseWidthParams,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        if !params.is_valid() {
            return Err(OctoQuadError::InvalidPulseWidth {
                min: params.min_us,
                max: params.max_us,
            });
        }
        let frame = self
            .set_param(param::CHANNEL_PULSE_WIDTH_MIN_MAX)?
            .param(channel)
            .param_u16(params.min_us)
            .param_u16(params.max_us);
        self.verify().await?;
        self.send(&frame).await
    }

    /// Read back the pulse-width range of `channel`.
    pub async fn get_pulse_width_params(
        &mut self,
        channel: u8,
    ) -> Result<PulseWidthParams, OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        let frame = self.read_param(param::CHANNEL_PULSE_WIDTH_MIN_MAX)?.param(channel);
        self.verify().await?;

        let mut buf = [0u8; 4];
        let bytes = self.query(&frame, &mut buf).await?;
        Ok(PulseWidthParams {
            min_us: decode_u16(&bytes[0..2]),
            max_us: decode_u16(&bytes[2..4]),
        })
    }

    // -----------------------------------------------------------------------
    // I2C recovery mode
    // -----------------------------------------------------------------------

    /// Select how the board recovers a wedged I2C bus.
    pub async fn set_i2c_recovery_mode(
        &mut self,
        mode: I2cRecoveryMode,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let frame = match self.map.revision() {
            ProtocolRevision::A => {
                CommandFrame::new(self.opcode(self.map.commands.set_i2c_recovery_mode)?)
                    .param(mode.code())
            }
            ProtocolRevision::B => self.set_param(param::I2C_RECOVERY_MODE)?.param(mode.code()),
        };
        self.verify().await?;
        self.send(&frame).await
    }

    /// Read the recovery mode. Revision B only. Unknown codes read as
    /// [`I2cRecoveryMode::None`] with the raw code attached.
    pub async fn get_i2c_recovery_mode(
        &mut self,
    ) -> Result<Readback<I2cRecoveryMode>, OctoQuadError<B::Error>> {
        let frame = self.read_param(param::I2C_RECOVERY_MODE)?;
        self.verify().await?;

        let mut buf = [0u8; 1];
        let bytes = self.query(&frame, &mut buf).await?;
        Ok(Readback::decode(bytes[0], I2cRecoveryMode::from_code))
    }

    // -----------------------------------------------------------------------
    // Whole-device commands
    // -----------------------------------------------------------------------

    /// Run the firmware's internal reset routine.
    pub async fn reset_everything(&mut self) -> Result<(), OctoQuadError<B::Error>> {
        let frame = CommandFrame::new(self.map.commands.reset_everything);
        self.verify().await?;
        self.send(&frame).await
    }

    /// Persist the current parameters to the board's flash. Revision B only.
    ///
    /// The board is busy while writing flash; this waits
    /// [`FLASH_SAVE_DELAY_MS`] on `delay` before returning.
    pub async fn save_parameters_to_flash<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), OctoQuadError<B::Error>> {
        let frame = CommandFrame::new(self.opcode(self.map.commands.write_params_to_flash)?);
        self.verify().await?;
        self.send(&frame).await?;

        #[cfg(feature = "defmt")]
        defmt::info!("OctoQuad parameters written to flash");
        delay.delay_ms(FLASH_SAVE_DELAY_MS).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation and table lookups (no bus traffic)
    // -----------------------------------------------------------------------

    fn check_channel(channel: u8) -> Result<u8, OctoQuadError<B::Error>> {
        if channel > CHANNEL_LAST {
            return Err(OctoQuadError::InvalidChannel(channel));
        }
        Ok(channel)
    }

    fn check_interval(&self, ms: u16) -> Result<u8, OctoQuadError<B::Error>> {
        if ms < self.map.min_sample_interval() || ms > MAX_SAMPLE_INTERVAL {
            return Err(OctoQuadError::InvalidSampleInterval(ms));
        }
        Ok(ms as u8)
    }

    fn unsupported(&self) -> OctoQuadError<B::Error> {
        OctoQuadError::Unsupported(self.map.revision())
    }

    fn field(&self, field: Field) -> Result<Register, OctoQuadError<B::Error>> {
        self.map.resolve(field).ok_or_else(|| self.unsupported())
    }

    fn channel_register(
        &self,
        family: ChannelField,
        channel: u8,
    ) -> Result<Register, OctoQuadError<B::Error>> {
        let channel = Self::check_channel(channel)?;
        self.map
            .resolve_channel(family, channel)
            .ok_or_else(|| self.unsupported())
    }

    fn channel_span(
        &self,
        family: ChannelField,
        first: u8,
        last: u8,
    ) -> Result<RegisterSpan, OctoQuadError<B::Error>> {
        if first > last || last > CHANNEL_LAST {
            return Err(OctoQuadError::InvalidChannelRange { first, last });
        }
        self.map
            .channel_span(family, first, last)
            .ok_or_else(|| self.unsupported())
    }

    fn span(&self, first: Register, last: Register) -> Result<RegisterSpan, OctoQuadError<B::Error>> {
        RegisterSpan::between(first, last).ok_or(OctoQuadError::InvalidRegisterSpan {
            first: first.address,
            last: last.address,
        })
    }

    fn opcode(&self, opcode: Option<u8>) -> Result<u8, OctoQuadError<B::Error>> {
        opcode.ok_or_else(|| self.unsupported())
    }

    fn set_param(&self, id: u8) -> Result<CommandFrame, OctoQuadError<B::Error>> {
        Ok(CommandFrame::new(self.opcode(self.map.commands.set_param)?).param(id))
    }

    fn read_param(&self, id: u8) -> Result<CommandFrame, OctoQuadError<B::Error>> {
        Ok(CommandFrame::new(self.opcode(self.map.commands.read_param)?).param(id))
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    async fn read_register<'b>(
        &mut self,
        register: Register,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], OctoQuadError<B::Error>> {
        let span = self.span(register, register)?;
        self.read_span(span, buf).await
    }

    /// Read `span` into the front of `buf` with one bus read.
    async fn read_span<'b>(
        &mut self,
        span: RegisterSpan,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], OctoQuadError<B::Error>> {
        let actual = buf.len();
        let dst = buf.get_mut(..span.len).ok_or(OctoQuadError::LengthMismatch {
            expected: span.len,
            actual,
        })?;
        self.bus.read(span.address, dst).await?;
        Ok(&*dst)
    }

    async fn write_register(
        &mut self,
        register: Register,
        bytes: &[u8],
    ) -> Result<(), OctoQuadError<B::Error>> {
        let span = self.span(register, register)?;
        self.write_span(span, bytes).await
    }

    /// Write exactly `span.len` bytes starting at `span.address`.
    async fn write_span(
        &mut self,
        span: RegisterSpan,
        bytes: &[u8],
    ) -> Result<(), OctoQuadError<B::Error>> {
        if bytes.len() != span.len {
            return Err(OctoQuadError::LengthMismatch {
                expected: span.len,
                actual: bytes.len(),
            });
        }
        self.bus.write(span.address, bytes).await?;
        Ok(())
    }

    /// Write a command frame to COMMAND and the parameter registers after it.
    async fn send(&mut self, frame: &CommandFrame) -> Result<(), OctoQuadError<B::Error>> {
        let span = self
            .map
            .command_span(frame.param_len())
            .ok_or(OctoQuadError::LengthMismatch {
                expected: 1 + self.map.command_data_len() as usize,
                actual: frame.requested_len(),
            })?;
        if frame.requested_len() != span.len {
            return Err(OctoQuadError::LengthMismatch {
                expected: span.len,
                actual: frame.requested_len(),
            });
        }
        self.write_span(span, frame.as_bytes()).await
    }

    /// Send a READ_PARAM frame, then read the staged value from the command
    /// data registers into `buf`.
    async fn query<'b>(
        &mut self,
        frame: &CommandFrame,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], OctoQuadError<B::Error>> {
        let first = self.field(Field::CommandData(0))?;
        let last_index = u8::try_from(buf.len().saturating_sub(1)).unwrap_or(u8::MAX);
        let last = self.field(Field::CommandData(last_index))?;
        let span = self.span(first, last)?;

        self.send(frame).await?;
        self.read_span(span, buf).await
    }
}
