//! Board support: pin assignment, SD card service and entropy
pub mod entropy;
pub mod resources;
pub mod sd_card;
