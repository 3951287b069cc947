//! Card power sequencing
//!
//! Before the first bus transaction the chip-select line is parked high, so the
//! card does not see a selected bus while it powers up, and then the card
//! supply is switched on.

use embedded_hal::digital::OutputPin;

use crate::error::Line;

/// Brings the card out of reset before the first mount
pub trait PowerSequence {
    fn power_on(&mut self) -> Result<(), Line>;
}

/// Chip-select and power-enable lines of the card socket
pub struct CardPower<CS, PWR> {
    cs: CS,
    power: PWR,
}

impl<CS: OutputPin, PWR: OutputPin> CardPower<CS, PWR> {
    pub fn new(cs: CS, power: PWR) -> Self {
        Self { cs, power }
    }
}

impl<CS: OutputPin, PWR: OutputPin> PowerSequence for CardPower<CS, PWR> {
    fn power_on(&mut self) -> Result<(), Line> {
        self.cs.set_high().map_err(|_| Line::ChipSelect)?;
        self.power.set_high().map_err(|_| Line::Power)?;
        Ok(())
    }
}
