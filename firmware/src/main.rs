//! SD card stress firmware entry point
//!
//! Mounts the card with a fresh filesystem and spawns the stress task.

#![no_std]
#![no_main]

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use sd_stress::{Storage, StorageConfig};
use system::{entropy::Entropy, resources::AssignedResources, sd_card};
use task::stress::stress;
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Board support
mod system;
/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());
    info!("Hello world!");

    let r = split_resources!(p);

    let (service, power) = sd_card::init(r.sd_card);
    let mut storage = match Storage::new(service, power, StorageConfig::new()) {
        Ok(storage) => storage,
        Err(err) => {
            error!("storage setup failed: {}", err);
            return;
        }
    };

    let volume = match storage.initialize(true).await {
        Ok(volume) => volume,
        Err(err) => {
            error!("mount failed: {}", err);
            return;
        }
    };

    spawner.spawn(stress(storage, volume, Entropy::new(r.entropy))).unwrap();
}
