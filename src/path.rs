//! Stress file naming
//!
//! Files are named `<root>/XXXXXXXX.BIN` after a random 32-bit value, which is
//! an 8.3 name on any FAT volume.

use core::fmt::Write;

use heapless::String;

/// Capacity of a full file path
pub const MAX_PATH_LEN: usize = 48;

/// Length of `/XXXXXXXX.BIN`
const NAME_LEN: usize = 13;

/// Longest mount root that still fits a file name
pub const MAX_ROOT_LEN: usize = MAX_PATH_LEN - NAME_LEN;

pub type FilePath = String<MAX_PATH_LEN>;

/// Builds the path for the file named after `id`.
///
/// Returns `None` if `root` is longer than [`MAX_ROOT_LEN`].
pub fn file_path(root: &str, id: u32) -> Option<FilePath> {
    let mut path = FilePath::new();
    write!(path, "{}/{:08X}.BIN", root, id).ok()?;
    Some(path)
}

/// Whether `path` is a stress file directly under `root`
pub fn is_stress_file(root: &str, path: &str) -> bool {
    let Some(name) = path.strip_prefix(root).and_then(|rest| rest.strip_prefix('/')) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".BIN") else {
        return false;
    };
    stem.len() == 8 && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F'))
}
