//! Stress run configuration
//!
//! Everything is fixed at compile time on the target; the structs only exist so
//! that tests (and other boards) can override individual values.

/// Root path the FAT volume is mounted at
pub const MOUNT_ROOT: &str = "/sdcard";

/// Maximum number of files the filesystem keeps open at once
pub const MAX_OPEN_FILES: usize = 10;

/// FAT allocation unit used when formatting (32 sectors of 512 bytes)
pub const ALLOCATION_UNIT_SIZE: u32 = 32 * 512;

/// Pause between two chunks and after closing a file (ms)
pub const WRITE_PAUSE_MS: u32 = 100;

/// A file is closed when the close draw exceeds this value (~10% of draws)
pub const CLOSE_THRESHOLD: u32 = u32::MAX / 10 * 9;

/// Failed create attempts tolerated before falling back to reformatting
pub const MAX_REOPEN_ATTEMPTS: u8 = 3;

/// Options handed to the mount service on every mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MountConfig {
    /// Erase and reinitialize the volume before mounting
    pub format_before_mount: bool,
    /// Format only if the volume cannot be mounted as-is
    pub format_if_mount_failed: bool,
    /// Open file limit
    pub max_files: usize,
    /// Cluster size in bytes, only used when formatting
    pub allocation_unit_size: u32,
}

impl MountConfig {
    /// Mount options used by this firmware, optionally formatting first
    pub const fn new(format_before_mount: bool) -> Self {
        Self {
            format_before_mount,
            format_if_mount_failed: false,
            max_files: MAX_OPEN_FILES,
            allocation_unit_size: ALLOCATION_UNIT_SIZE,
        }
    }
}

/// Mount orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageConfig {
    /// Mount point, also the directory all stress files are created in
    pub root: &'static str,
    /// Drive chip-select and card power high before the first mount.
    ///
    /// Off by default: current boards power the card permanently and it is not
    /// known whether every board needs the sequence.
    pub enable_power_sequencing: bool,
}

impl StorageConfig {
    pub const fn new() -> Self {
        Self {
            root: MOUNT_ROOT,
            enable_power_sequencing: false,
        }
    }

    pub const fn with_power_sequencing(mut self, enable: bool) -> Self {
        self.enable_power_sequencing = enable;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Stress loop tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StressConfig {
    pub pause_ms: u32,
    pub close_threshold: u32,
    pub max_reopen_attempts: u8,
}

impl StressConfig {
    pub const fn new() -> Self {
        Self {
            pause_ms: WRITE_PAUSE_MS,
            close_threshold: CLOSE_THRESHOLD,
            max_reopen_attempts: MAX_REOPEN_ATTEMPTS,
        }
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}
