//! Dashboard session: the explicit event handler between the presentation
//! layer and the data layer.
//!
//! Each input change is delivered as a [`FilterEvent`]; the session updates its
//! [`FilterState`] and returns the view for it, served from the [`ViewCache`]
//! when the same selection was already computed for the current table
//! version.

use std::path::PathBuf;
use std::sync::Arc;

use emissions_core::error::Result;
use emissions_core::models::{CountryFilter, EmissionsTable, FilterState, YearRange};
use emissions_data::dashboard::{build_view, country_options, DashboardView};

use crate::data_manager::{DataManager, TableVersion};
use crate::view_cache::{ViewCache, ViewKey};

/// A change of the dashboard inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    SelectCountry(CountryFilter),
    SelectYears(YearRange),
    /// Re-read the dataset from disk.
    Reload,
}

/// One user's dashboard state over a cached dataset.
pub struct DashboardSession {
    data: DataManager,
    views: ViewCache,
    state: FilterState,
}

impl DashboardSession {
    /// Open a session on the dataset at `path`.
    ///
    /// The dataset is loaded immediately so a missing or malformed file fails
    /// here, before anything is rendered.
    pub fn open(path: impl Into<PathBuf>, initial: FilterState) -> Result<Self> {
        let mut data = DataManager::new(path);
        data.get_table()?;
        Ok(Self {
            data,
            views: ViewCache::default(),
            state: initial,
        })
    }

    /// A second, independent session over the same loaded table.
    ///
    /// Only the immutable table is shared; filter state and views are the
    /// new session's own.
    pub fn fork(&self, initial: FilterState) -> Self {
        Self {
            data: self.data.clone(),
            views: ViewCache::default(),
            state: initial,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn table_version(&self) -> Option<TableVersion> {
        self.data.current_version()
    }

    /// Time since the dataset was last parsed.
    pub fn table_age(&self) -> Option<chrono::Duration> {
        self.data.cache_age()
    }

    /// View cache statistics as `(hits, misses)`.
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.views.hits(), self.views.misses())
    }

    /// Apply `event` and return the view for the resulting state.
    ///
    /// When the new selection cannot be computed the previous state is kept
    /// and the error returned.
    pub fn apply(&mut self, event: FilterEvent) -> Result<Arc<DashboardView>> {
        tracing::debug!(?event, "filter event");
        let previous = self.state.clone();

        match event {
            FilterEvent::SelectCountry(country) => self.state.country = country,
            FilterEvent::SelectYears(years) => self.state.years = years,
            FilterEvent::Reload => {
                self.data.reload()?;
            }
        }

        match self.view() {
            Ok(view) => Ok(view),
            Err(e) => {
                tracing::warn!(error = %e, "filter rejected; keeping previous selection");
                self.state = previous;
                Err(e)
            }
        }
    }

    /// The view for the current state.
    pub fn view(&mut self) -> Result<Arc<DashboardView>> {
        let (table, version) = self.current_table()?;
        self.views.purge_stale(version);

        let key = ViewKey::new(version, &self.state);
        let state = &self.state;
        let view = self
            .views
            .get_or_try_insert_with(key, || build_view(&table, state))?;
        Ok(view)
    }

    /// The base table, reloaded first if the file changed on disk.
    pub fn table(&mut self) -> Result<Arc<EmissionsTable>> {
        Ok(self.current_table()?.0)
    }

    /// Options for the country selector: `"All"` followed by every country.
    pub fn country_options(&mut self) -> Result<Vec<String>> {
        let (table, _) = self.current_table()?;
        Ok(country_options(&table))
    }

    fn current_table(&mut self) -> Result<(Arc<EmissionsTable>, TableVersion)> {
        let loaded = self.data.get_table()?;
        Ok((Arc::clone(&loaded.table), loaded.version))
    }
}
