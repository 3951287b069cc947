//! SD card stress task
//!
//! Runs the random file writer against the mounted card until recovery fails or
//! [`STRESS_CANCEL`] is raised.
//!
//! # Lifecycle
//! - Takes ownership of the storage orchestrator and the mounted volume
//! - On cancel, unmounts the card cleanly
//! - On a failed recovery, logs the counters and parks on the cancel token; the
//!   card is left alone from then on

use defmt::{error, info, warn, Debug2Format};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Delay;
use sd_stress::{CancelToken, Outcome, StressConfig, StressLoop};

use crate::system::{
    entropy::Entropy,
    sd_card::{SdStorage, SdVolume},
};

/// Stops the stress loop at its next step or pause
pub static STRESS_CANCEL: CancelToken<CriticalSectionRawMutex> = CancelToken::new();

#[embassy_executor::task]
pub async fn stress(mut storage: SdStorage, volume: SdVolume, entropy: Entropy) {
    let mut stress = StressLoop::new(entropy, Delay, &STRESS_CANCEL, StressConfig::new());

    match stress.run(&mut storage, volume).await {
        Outcome::Cancelled { volume, counters } => {
            info!("stress loop stopped: {}", counters);
            if let Err(err) = storage.unmount(volume).await {
                warn!("unmount failed: {}", Debug2Format(&err));
            }
        }
        Outcome::Halted { error: err, counters } => {
            error!("stress loop halted: {} {}", err, counters);
            // Nothing else to do; wait without spinning
            STRESS_CANCEL.cancelled().await;
        }
    }
}
