//! Fixed write buffer
//!
//! Every chunk the stress loop writes is a prefix of one 8 KiB buffer filled
//! with an additive pattern: 32-bit word `i` holds `i`, little-endian. The
//! buffer is built at compile time and lives in flash.

use crate::random::scale;

/// Size of the write buffer, and the exclusive upper bound of a chunk
pub const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// The buffer all stress writes are taken from
pub static WRITE_BUFFER: WriteBuffer = WriteBuffer::new();

pub struct WriteBuffer {
    bytes: [u8; WRITE_BUFFER_SIZE],
}

impl WriteBuffer {
    pub const fn new() -> Self {
        let mut bytes = [0u8; WRITE_BUFFER_SIZE];
        let mut word = 0;
        while word < WRITE_BUFFER_SIZE / 4 {
            let le = (word as u32).to_le_bytes();
            let at = word * 4;
            bytes[at] = le[0];
            bytes[at + 1] = le[1];
            bytes[at + 2] = le[2];
            bytes[at + 3] = le[3];
            word += 1;
        }
        Self { bytes }
    }

    /// Maps a random draw onto a chunk length in `0..WRITE_BUFFER_SIZE`
    pub fn chunk_len(&self, draw: u32) -> usize {
        scale(draw, WRITE_BUFFER_SIZE)
    }

    /// First `len` bytes of the buffer, clamped to its size
    pub fn chunk(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(WRITE_BUFFER_SIZE)]
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
