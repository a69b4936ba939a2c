mod common;

use common::{driver, read, verified, MockBus};
use embassy_futures::block_on;
use octoquad_driver::{OctoQuadError, ProtocolRevision};

const POSITION_BASE: u8 = 0x0C;
const VELOCITY_BASE: u8 = 0x2C;

fn load_positions(bus: &MockBus, base: u8, values: &[i32; 8]) {
    for (i, v) in values.iter().enumerate() {
        bus.put(base + 4 * i as u8, &v.to_le_bytes());
    }
}

fn load_velocities(bus: &MockBus, base: u8, values: &[i16; 8]) {
    for (i, v) in values.iter().enumerate() {
        bus.put(base + 2 * i as u8, &v.to_le_bytes());
    }
}

const POSITIONS: [i32; 8] = [i32::MIN, -1, 0, i32::MAX, 1000, -2000, 123_456, 7];
const VELOCITIES: [i16; 8] = [i16::MIN, -1, 0, i16::MAX, 10, -20, 300, -4000];

#[test]
fn single_position_decodes_signed_little_endian() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_positions(&bus, POSITION_BASE, &POSITIONS);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    for (ch, &expected) in POSITIONS.iter().enumerate() {
        assert_eq!(block_on(octoquad.read_position(ch as u8)).unwrap(), expected);
    }
    assert_eq!(bus.log()[3], read(POSITION_BASE + 12, 4));
}

#[test]
fn position_range_is_one_read_in_channel_order() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_positions(&bus, POSITION_BASE, &POSITIONS);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    let values = block_on(octoquad.read_position_range(2, 5)).unwrap();
    assert_eq!(values.as_slice(), &POSITIONS[2..=5]);
    assert_eq!(bus.log(), vec![read(POSITION_BASE + 2 * 4, 16)]);
}

#[test]
fn single_channel_range() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_positions(&bus, POSITION_BASE, &POSITIONS);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    let values = block_on(octoquad.read_position_range(7, 7)).unwrap();
    assert_eq!(values.as_slice(), &[7]);
    assert_eq!(bus.log(), vec![read(POSITION_BASE + 28, 4)]);
}

#[test]
fn all_positions_in_one_read() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_positions(&bus, POSITION_BASE, &POSITIONS);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    assert_eq!(block_on(octoquad.read_all_positions()).unwrap(), POSITIONS);
    assert_eq!(bus.log(), vec![read(POSITION_BASE, 32)]);
}

#[test]
fn velocities_single_range_and_all() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_velocities(&bus, VELOCITY_BASE, &VELOCITIES);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    assert_eq!(block_on(octoquad.read_velocity(0)).unwrap(), i16::MIN);
    let range = block_on(octoquad.read_velocity_range(1, 3)).unwrap();
    assert_eq!(range.as_slice(), &VELOCITIES[1..=3]);
    assert_eq!(block_on(octoquad.read_all_velocities()).unwrap(), VELOCITIES);

    assert_eq!(
        bus.log(),
        vec![
            read(VELOCITY_BASE, 2),
            read(VELOCITY_BASE + 2, 6),
            read(VELOCITY_BASE, 16),
        ]
    );
}

#[test]
fn combined_read_spans_both_blocks_once() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    load_positions(&bus, POSITION_BASE, &POSITIONS);
    load_velocities(&bus, VELOCITY_BASE, &VELOCITIES);
    let mut octoquad = verified(&bus, ProtocolRevision::B);

    let block = block_on(octoquad.read_all_encoder_data()).unwrap();
    assert_eq!(block.positions, POSITIONS);
    assert_eq!(block.velocities, VELOCITIES);
    assert_eq!(bus.log(), vec![read(POSITION_BASE, 48)]);
}

#[test]
fn invalid_channels_never_touch_the_bus() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    let mut octoquad = driver(&bus, ProtocolRevision::B);

    for ch in [8u8, 9, 100, 255] {
        assert_eq!(
            block_on(octoquad.read_position(ch)).unwrap_err(),
            OctoQuadError::InvalidChannel(ch)
        );
        assert_eq!(
            block_on(octoquad.read_velocity(ch)).unwrap_err(),
            OctoQuadError::InvalidChannel(ch)
        );
        assert!(block_on(octoquad.reset_position(ch)).is_err());
        assert!(block_on(octoquad.reset_positions(&[0, ch])).is_err());
        assert!(block_on(octoquad.set_direction(ch, true)).is_err());
        assert!(block_on(octoquad.get_direction(ch)).is_err());
        assert!(block_on(octoquad.set_velocity_sample_interval(ch, 10)).is_err());
        assert!(block_on(octoquad.get_velocity_sample_interval(ch)).is_err());
        assert!(block_on(octoquad.get_pulse_width_params(ch)).is_err());
    }

    assert!(bus.log().is_empty());
    assert!(!octoquad.is_verified());
}

#[test]
fn invalid_ranges_never_touch_the_bus() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    let mut octoquad = driver(&bus, ProtocolRevision::B);

    assert_eq!(
        block_on(octoquad.read_position_range(5, 2)).unwrap_err(),
        OctoQuadError::InvalidChannelRange { first: 5, last: 2 }
    );
    assert_eq!(
        block_on(octoquad.read_velocity_range(0, 8)).unwrap_err(),
        OctoQuadError::InvalidChannelRange { first: 0, last: 8 }
    );
    assert!(bus.log().is_empty());
}

#[test]
fn bus_failure_is_returned_unchanged() {
    let bus = MockBus::healthy(ProtocolRevision::B);
    let mut octoquad = verified(&bus, ProtocolRevision::B);
    bus.set_fail(true);

    assert_eq!(
        block_on(octoquad.read_all_encoder_data()).unwrap_err(),
        OctoQuadError::Bus(common::BusFault)
    );
    assert_eq!(bus.log().len(), 1);
}
