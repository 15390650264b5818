//! Runtime layer for the CO2 emissions dashboard.
//!
//! Caches the loaded table per file state, memoises views per filter
//! selection, and exposes [`session::DashboardSession`] as the event handler
//! the presentation layer drives.

pub mod data_manager;
pub mod session;
pub mod view_cache;

pub use emissions_core as core;
pub use emissions_data as data;
