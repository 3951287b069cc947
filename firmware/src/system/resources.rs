//! Hardware Resource Management
//!
//! Assigns the RP2350 pins and peripherals used by the firmware to the parts of
//! the system that own them:
//! - SD card: SPI0 bus, chip-select and card power lines, two DMA channels
//! - Entropy: the hardware TRNG
//!
//! # Shared Resources
//! The SPI bus and the chip-select line are set up once in `main` and then shared
//! between power sequencing and the SD driver; see `system::sd_card`.

use assign_resources::assign_resources;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, TRNG};
use embassy_rp::trng::InterruptHandler as TrngInterruptHandler;

assign_resources! {
    /// SD card socket on SPI0
    sd_card: SdCardResources {
        spi: SPI0,
        clk_pin: PIN_18,
        mosi_pin: PIN_19,
        miso_pin: PIN_16,
        cs_pin: PIN_17,
        // Card supply switch
        power_pin: PIN_22,
        tx_dma: DMA_CH0,
        rx_dma: DMA_CH1,
    },
    /// Hardware random number generator
    entropy: EntropyResources {
        trng: TRNG,
    },
}

bind_interrupts!(pub struct Irqs {
    TRNG_IRQ => TrngInterruptHandler<TRNG>;
});
