pub mod admit_cards;
pub mod core;
pub mod records;
pub mod render;
pub mod setup;
pub mod uploads;
