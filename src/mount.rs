//! Mount orchestration
//!
//! [`Storage`] owns the platform storage service and the card's power lines.
//! It performs the initial (optionally formatting) mount, the
//! remount-with-format used for recovery, and tracks whether a volume is
//! currently mounted so a second mount is rejected instead of silently
//! stacking.

use crate::config::{MountConfig, StorageConfig};
use crate::error::{Error, MountError};
use crate::fmt::Debug2Format;
use crate::path::MAX_ROOT_LEN;
use crate::power::PowerSequence;
use crate::storage::{StorageService, Volume};

pub struct Storage<S, P> {
    service: S,
    power: P,
    config: StorageConfig,
    mounted: bool,
}

impl<S: StorageService, P: PowerSequence> Storage<S, P> {
    /// Fails with [`Error::InvalidRoot`] if the root leaves no room for file names
    pub fn new(service: S, power: P, config: StorageConfig) -> Result<Self, Error<S::Error>> {
        if config.root.len() > MAX_ROOT_LEN {
            return Err(Error::InvalidRoot);
        }
        Ok(Self {
            service,
            power,
            config,
            mounted: false,
        })
    }

    pub fn root(&self) -> &'static str {
        self.config.root
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Powers the card (if enabled) and mounts its filesystem.
    ///
    /// # Errors
    /// - [`MountError::AlreadyMounted`] if called again without [`unmount`](Self::unmount)
    /// - [`Error::HardwareConfig`] if a power line cannot be driven
    /// - any mount failure of the service, unchanged
    pub async fn initialize(&mut self, format: bool) -> Result<S::Volume, Error<S::Error>> {
        if self.mounted {
            error!("{} is already mounted", self.config.root);
            return Err(MountError::AlreadyMounted.into());
        }

        if self.config.enable_power_sequencing {
            debug!("powering card");
            self.power.power_on().map_err(Error::HardwareConfig)?;
        } else {
            debug!("power sequencing disabled");
        }

        self.mount(format).await.map_err(Error::Mount)
    }

    /// Drops the current volume and mounts a freshly formatted one.
    ///
    /// Unmounting is best-effort; only the mount result is reported.
    pub async fn remount_with_format(
        &mut self,
        volume: S::Volume,
    ) -> Result<S::Volume, Error<S::Error>> {
        if let Err(err) = self.service.unmount(self.config.root, volume).await {
            error!("Unmounting failed: {}", Debug2Format(&err));
        }
        self.mounted = false;

        self.mount(true).await.map_err(Error::Mount)
    }

    pub async fn unmount(&mut self, volume: S::Volume) -> Result<(), Error<S::Error>> {
        self.mounted = false;
        self.service
            .unmount(self.config.root, volume)
            .await
            .map_err(|err| Error::Mount(MountError::Card(err)))?;
        info!("Filesystem unmounted");
        Ok(())
    }

    async fn mount(&mut self, format: bool) -> Result<S::Volume, MountError<S::Error>> {
        let config = MountConfig::new(format);
        debug!("Mounting filesystem at {} (format: {})", self.config.root, format);

        let volume = match self.service.mount(self.config.root, &config).await {
            Ok(volume) => volume,
            Err(err) => {
                if err.may_need_format() {
                    error!("Failed to mount filesystem. Perhaps formatting is required");
                } else {
                    error!("Failed to initialize the card ({})", Debug2Format(&err));
                }
                return Err(err);
            }
        };
        self.mounted = true;

        info!("Filesystem mounted");
        match volume.card_info().await {
            Ok(card) => {
                info!(
                    "cluster {} bytes, capacity {} bytes, free {} bytes",
                    card.cluster_size,
                    card.total_bytes,
                    card.free_bytes
                );
            }
            Err(err) => {
                warn!("card info unavailable: {}", Debug2Format(&err));
            }
        }

        Ok(volume)
    }
}
