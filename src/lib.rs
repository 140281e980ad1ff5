//! Pressure-time countdown grid for a factory workstation.
//!
//! Each slot of the grid (`A-01` .. `Z-26` for 13 columns) holds an
//! independent countdown tracking the dwell period of one physical part.
//! Before a barcode may start its dwell here, the [`sequence`] module checks
//! that the part finished its dwell at the previous station, using the
//! record store's clock as the single source of "now".

pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod sequence;
pub mod session;
pub mod store;
pub mod timer;
pub mod ui;

pub use error::PressureError;
