//! Platform storage seam
//!
//! The SD protocol and the FAT implementation belong to the platform. This
//! module only describes the surface the stress loop consumes: mounting and
//! unmounting a volume, creating and removing files on it, and writing to and
//! closing an open file.
//!
//! A mounted [`Volume`] is an owned handle. It is threaded through every
//! operation and handed back on unmount; there is no process-wide card state.

use core::fmt::Debug;

use crate::config::MountConfig;
use crate::error::MountError;

/// Filesystem geometry reported after mounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardInfo {
    pub cluster_size: u32,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Mounts and unmounts volumes
#[allow(async_fn_in_trait)]
pub trait StorageService {
    type Error: Debug;
    type Volume: Volume<Error = Self::Error>;

    /// Attaches the card's filesystem at `root`
    async fn mount(
        &mut self,
        root: &str,
        config: &MountConfig,
    ) -> Result<Self::Volume, MountError<Self::Error>>;

    /// Detaches a volume previously returned by [`mount`](Self::mount)
    async fn unmount(&mut self, root: &str, volume: Self::Volume) -> Result<(), Self::Error>;
}

/// A mounted filesystem
#[allow(async_fn_in_trait)]
pub trait Volume {
    type Error: Debug;
    type File<'a>: VolumeFile<Error = Self::Error>
    where
        Self: 'a;

    /// Creates `path` for read-write access, truncating an existing file
    async fn create(&self, path: &str) -> Result<Self::File<'_>, Self::Error>;

    async fn remove(&self, path: &str) -> Result<(), Self::Error>;

    async fn card_info(&self) -> Result<CardInfo, Self::Error>;
}

/// A file open for writing
#[allow(async_fn_in_trait)]
pub trait VolumeFile {
    type Error: Debug;

    /// Writes all of `data` at the current position
    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flushes and closes the file
    async fn close(self) -> Result<(), Self::Error>;
}
