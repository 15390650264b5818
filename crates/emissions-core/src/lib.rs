//! Shared model, error, settings and formatting types for the CO2 emissions
//! dashboard.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{DashboardError, DataLoadError, InvalidRangeError, Result};
