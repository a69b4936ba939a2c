//! OctoQuad monitor
//!
//! Demonstrates the octoquad-driver crate on the Raspberry Pi Pico 2.
//! Configures the OctoQuad for quadrature input on all channels, persists the
//! configuration, then logs every position and velocity at 10 Hz via defmt.
//!
//! # Wiring
//!
//! | Signal    | Pico 2 Pin | Notes                        |
//! |-----------|------------|------------------------------|
//! | I2C0 SDA  | GP20       | OctoQuad uses 3.3 V logic    |
//! | I2C0 SCL  | GP21       |                              |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp as hal;
use embassy_rp::bind_interrupts;
use embassy_rp::block::ImageDef;
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_time::{Delay, Duration, Ticker};
use {defmt_rtt as _, panic_probe as _};

use octoquad_driver::{ChannelBankConfig, OctoQuad};

/// Tell the Boot ROM about our application.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = hal::block::ImageDef::secure_exe();

// Wire the I2C0 interrupt to Embassy's handler.
bind_interrupts!(struct Irqs {
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
});

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let i2c = I2c::new_async(
        p.I2C0,
        p.PIN_21, // SCL
        p.PIN_20, // SDA
        Irqs,
        i2c::Config::default(),
    );

    let mut octoquad = OctoQuad::new(i2c);

    match octoquad.firmware_version().await {
        Ok(fw) => info!("OctoQuad firmware {}", fw),
        Err(e) => error!("Firmware read failed: {}", e),
    }

    if let Err(e) = octoquad.set_channel_bank_config(ChannelBankConfig::AllQuadrature).await {
        error!("Bank config failed: {}", e);
    }
    if let Err(e) = octoquad.set_all_velocity_sample_intervals(50).await {
        error!("Sample interval config failed: {}", e);
    }
    if let Err(e) = octoquad.save_parameters_to_flash(&mut Delay).await {
        error!("Flash save failed: {}", e);
    }

    for warning in octoquad.warnings() {
        warn!("{}", warning);
    }

    info!("OctoQuad monitor started — turn an encoder to see counts change");

    let mut ticker = Ticker::every(Duration::from_millis(100));
    loop {
        match octoquad.read_all_encoder_data().await {
            Ok(data) => info!("pos {} vel {}", data.positions, data.velocities),
            Err(e) => error!("Read failed: {}", e),
        }
        ticker.next().await;
    }
}
