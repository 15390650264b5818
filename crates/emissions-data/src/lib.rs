//! Data layer for the CO2 emissions dashboard.
//!
//! Loads the emissions register from CSV, aggregates it per year and per
//! installation, and builds the view model the presentation layer renders.

pub mod aggregator;
pub mod dashboard;
pub mod loader;

pub use emissions_core as core;
