//! Random draws for the stress loop
//!
//! File names, chunk lengths and close decisions all come from here. By default
//! every draw is read from the RP2350 TRNG. Setting [`FIXED_SEED`] switches to a
//! seeded WyRand so a run can be repeated draw for draw against another card.

use embassy_rp::peripherals::TRNG;
use embassy_rp::trng::{self, Trng};
use nanorand::WyRand;
use sd_stress::EntropySource;

use crate::system::resources::{EntropyResources, Irqs};

/// Seed for reproducible runs; `None` uses the hardware generator
const FIXED_SEED: Option<u64> = None;

pub enum Entropy {
    Hardware(Trng<'static, TRNG>),
    Seeded(WyRand),
}

impl Entropy {
    pub fn new(r: EntropyResources) -> Self {
        match FIXED_SEED {
            Some(seed) => {
                defmt::info!("using fixed seed {=u64:#x}", seed);
                Entropy::Seeded(WyRand::new_seed(seed))
            }
            None => Entropy::Hardware(Trng::new(r.trng, Irqs, trng::Config::default())),
        }
    }
}

impl EntropySource for Entropy {
    fn next_u32(&mut self) -> u32 {
        match self {
            Entropy::Hardware(trng) => {
                let mut bytes = [0u8; 4];
                trng.blocking_fill_bytes(&mut bytes);
                u32::from_le_bytes(bytes)
            }
            Entropy::Seeded(rng) => rng.next_u32(),
        }
    }
}
