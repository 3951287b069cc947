//! Error types
//!
//! `E` is the error type of the platform storage service. Startup errors reach
//! the entry point; file errors stay inside the stress loop where they are only
//! logged; `RecoveryExhausted` is the single error that ends the loop.

use core::fmt;

/// Output line driven during power sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    ChipSelect,
    Power,
}

/// Mount failures reported by the storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MountError<E> {
    /// A volume is already mounted at the root
    AlreadyMounted,
    /// The card answered but holds no usable filesystem; formatting may help
    NotMountable(E),
    /// The card itself failed (not present, no response, bus error)
    Card(E),
}

impl<E> MountError<E> {
    /// Whether formatting the card could fix this failure
    pub fn may_need_format(&self) -> bool {
        matches!(self, MountError::NotMountable(_))
    }
}

/// Errors of this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// A GPIO line could not be configured or driven
    HardwareConfig(Line),
    /// The mount root does not leave room for `/XXXXXXXX.BIN`
    InvalidRoot,
    Mount(MountError<E>),
    FileCreate(E),
    FileWrite(E),
    FileClose(E),
    /// Remount-with-format failed; the stress loop cannot continue
    RecoveryExhausted(MountError<E>),
}

impl<E> From<MountError<E>> for Error<E> {
    fn from(err: MountError<E>) -> Self {
        Error::Mount(err)
    }
}

impl<E: fmt::Debug> fmt::Display for MountError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::AlreadyMounted => f.write_str("volume already mounted"),
            MountError::NotMountable(e) => {
                write!(f, "failed to mount filesystem, formatting may be required: {e:?}")
            }
            MountError::Card(e) => write!(f, "failed to initialize the card: {e:?}"),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::HardwareConfig(line) => write!(f, "cannot drive {line:?} line"),
            Error::InvalidRoot => f.write_str("mount root too long"),
            Error::Mount(e) => write!(f, "mount: {e}"),
            Error::FileCreate(e) => write!(f, "create: {e:?}"),
            Error::FileWrite(e) => write!(f, "write: {e:?}"),
            Error::FileClose(e) => write!(f, "close: {e:?}"),
            Error::RecoveryExhausted(e) => write!(f, "remount with format failed: {e}"),
        }
    }
}
