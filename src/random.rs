//! Random draws
//!
//! The loop only ever needs uniformly distributed `u32` values. On the target
//! they come from the hardware TRNG; a seeded `WyRand` gives reproducible runs
//! and is what the tests use.

use nanorand::{Rng, WyRand};

/// Source of uniformly distributed 32-bit values
pub trait EntropySource {
    fn next_u32(&mut self) -> u32;
}

impl EntropySource for WyRand {
    fn next_u32(&mut self) -> u32 {
        self.generate::<u32>()
    }
}

impl<T: EntropySource + ?Sized> EntropySource for &mut T {
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }
}

/// Scales a draw into `0..range` by multiply-shift.
///
/// Exactly uniform when `range` is a power of two, otherwise biased by less
/// than `range / 2^32`.
pub fn scale(draw: u32, range: usize) -> usize {
    ((u64::from(draw) * range as u64) >> 32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_covers_the_range() {
        assert_eq!(scale(0, 10), 0);
        assert_eq!(scale(u32::MAX, 10), 9);
        assert_eq!(scale(u32::MAX, 1), 0);
        assert_eq!(scale(12345, 0), 0);
    }

    #[test]
    fn scaled_draws_are_roughly_uniform() {
        const BUCKETS: usize = 16;
        const DRAWS: usize = 160_000;
        let mut rng = WyRand::new_seed(0x5eed);
        let mut hits = [0usize; BUCKETS];
        for _ in 0..DRAWS {
            hits[scale(rng.next_u32(), BUCKETS)] += 1;
        }
        let expected = DRAWS / BUCKETS;
        for count in hits {
            let off = count.abs_diff(expected);
            assert!(off < expected / 20, "bucket count {count}, expected ~{expected}");
        }
    }
}
