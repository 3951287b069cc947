//! SD card stress loop
//!
//! Hardware-independent half of the SD stress firmware: mount orchestration,
//! power sequencing and the random file writer. The platform side (SPI bus, SD
//! protocol, FAT) plugs in through the traits in [`storage`].
//!
//! ```text
//! Storage::initialize(format) ──> Volume ──> StressLoop::run ──> Outcome
//!        │                                        │
//!        └── StorageService::mount        Storage::remount_with_format
//! ```

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod error;
pub mod mount;
pub mod path;
pub mod power;
pub mod random;
pub mod storage;
pub mod stress;

pub use buffer::{WriteBuffer, WRITE_BUFFER, WRITE_BUFFER_SIZE};
pub use cancel::CancelToken;
pub use config::{MountConfig, StorageConfig, StressConfig};
pub use error::{Error, Line, MountError};
pub use mount::Storage;
pub use power::{CardPower, PowerSequence};
pub use random::EntropySource;
pub use storage::{CardInfo, StorageService, Volume, VolumeFile};
pub use stress::{Counters, Outcome, Phase, StressLoop};
