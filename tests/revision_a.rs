mod common;

use common::{driver, read, verified, write, MockBus};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use octoquad_driver::{
    ChannelBankConfig, I2cRecoveryMode, OctoQuadError, ProtocolRevision, PulseWidthParams,
};

const REV: ProtocolRevision = ProtocolRevision::A;
const COMMAND: u8 = 0x04;
const POSITION_BASE: u8 = 0x08;
const VELOCITY_BASE: u8 = 0x28;
const INTERVAL_BASE: u8 = 0x38;

struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

#[test]
fn expects_firmware_major_one() {
    let bus = MockBus::healthy(REV);
    let mut octoquad = driver(&bus, REV);

    block_on(octoquad.verify()).unwrap();
    assert!(octoquad.warnings().is_empty());
    assert_eq!(octoquad.register_map().firmware_major(), 1);
}

#[test]
fn bulk_reads_use_revision_a_layout() {
    let bus = MockBus::healthy(REV);
    bus.put(POSITION_BASE + 4, &(-5i32).to_le_bytes());
    bus.put(VELOCITY_BASE + 14, &(42i16).to_le_bytes());
    let mut octoquad = verified(&bus, REV);

    let positions = block_on(octoquad.read_all_positions()).unwrap();
    assert_eq!(positions[1], -5);
    let block = block_on(octoquad.read_all_encoder_data()).unwrap();
    assert_eq!(block.positions[1], -5);
    assert_eq!(block.velocities[7], 42);

    assert_eq!(
        bus.log(),
        vec![read(POSITION_BASE, 32), read(POSITION_BASE, 48)]
    );
}

#[test]
fn commands_use_revision_a_opcodes() {
    let bus = MockBus::healthy(REV);
    let mut octoquad = verified(&bus, REV);

    block_on(octoquad.reset_position(0)).unwrap();
    block_on(octoquad.set_direction(3, true)).unwrap();
    block_on(octoquad.set_i2c_recovery_mode(I2cRecoveryMode::ResetPlusSclIdleToggle)).unwrap();
    block_on(octoquad.reset_everything()).unwrap();

    assert_eq!(
        bus.log(),
        vec![
            write(COMMAND, &[2, 0x01]),
            write(COMMAND, &[3, 0x08]),
            write(COMMAND, &[4, 2]),
            write(COMMAND, &[1]),
        ]
    );
}

#[test]
fn sample_intervals_are_plain_registers() {
    let bus = MockBus::healthy(REV);
    bus.put(INTERVAL_BASE, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let mut octoquad = verified(&bus, REV);

    // Zero is accepted by this revision.
    block_on(octoquad.set_velocity_sample_interval(2, 0)).unwrap();
    block_on(octoquad.set_all_velocity_sample_intervals(100)).unwrap();
    assert_eq!(block_on(octoquad.get_velocity_sample_interval(5)).unwrap(), 6);
    assert_eq!(
        block_on(octoquad.get_all_velocity_sample_intervals()).unwrap(),
        [1, 2, 3, 4, 5, 6, 7, 8]
    );

    assert_eq!(
        bus.log(),
        vec![
            write(INTERVAL_BASE + 2, &[0]),
            write(INTERVAL_BASE, &[100; 8]),
            read(INTERVAL_BASE + 5, 1),
            read(INTERVAL_BASE, 8),
        ]
    );

    assert_eq!(
        block_on(octoquad.set_velocity_sample_interval(2, 256)).unwrap_err(),
        OctoQuadError::InvalidSampleInterval(256)
    );
}

#[test]
fn revision_b_only_operations_are_rejected_without_traffic() {
    let bus = MockBus::healthy(REV);
    let mut octoquad = driver(&bus, REV);
    let unsupported = OctoQuadError::Unsupported(ProtocolRevision::A);

    assert_eq!(block_on(octoquad.get_direction(0)).unwrap_err(), unsupported);
    assert_eq!(block_on(octoquad.get_all_directions()).unwrap_err(), unsupported);
    assert_eq!(
        block_on(octoquad.set_channel_bank_config(ChannelBankConfig::AllPulseWidth)).unwrap_err(),
        unsupported
    );
    assert_eq!(block_on(octoquad.get_channel_bank_config()).unwrap_err(), unsupported);
    assert_eq!(
        block_on(octoquad.set_pulse_width_params(0, PulseWidthParams::new(1, 1024))).unwrap_err(),
        unsupported
    );
    assert_eq!(block_on(octoquad.get_pulse_width_params(0)).unwrap_err(), unsupported);
    assert_eq!(block_on(octoquad.get_i2c_recovery_mode()).unwrap_err(), unsupported);
    assert_eq!(
        block_on(octoquad.save_parameters_to_flash(&mut NoDelay)).unwrap_err(),
        unsupported
    );

    assert!(bus.log().is_empty());
}
