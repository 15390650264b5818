//! Memoised dashboard views.
//!
//! Views are keyed by the table version and the full filter selection, so a
//! cached view can never outlive the table state it was computed from.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use emissions_core::models::{CountryFilter, FilterState};
use emissions_data::dashboard::DashboardView;

use crate::data_manager::TableVersion;

/// Default bound on the number of cached views.
pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Cache key: `(tableVersion, startYear, endYear, country)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub version: TableVersion,
    pub start_year: u16,
    pub end_year: u16,
    pub country: CountryFilter,
}

impl ViewKey {
    pub fn new(version: TableVersion, filter: &FilterState) -> Self {
        Self {
            version,
            start_year: filter.years.start(),
            end_year: filter.years.end(),
            country: filter.country.clone(),
        }
    }
}

/// Bounded view cache; the oldest insertion is evicted first.
pub struct ViewCache {
    entries: HashMap<ViewKey, Arc<DashboardView>>,
    /// Insertion order, oldest first.
    order: VecDeque<ViewKey>,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ViewCache {
    /// `max_entries` is clamped to at least one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached view for `key`, or compute and cache it.
    ///
    /// Failed computations are not cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: ViewKey,
        compute: impl FnOnce() -> Result<DashboardView, E>,
    ) -> Result<Arc<DashboardView>, E> {
        if let Some(view) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(?key, "view cache hit");
            return Ok(Arc::clone(view));
        }

        self.misses += 1;
        tracing::debug!(?key, "view cache miss");
        let view = Arc::new(compute()?);
        self.insert(key, Arc::clone(&view));
        Ok(view)
    }

    /// Drop every view computed from a version other than `current`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&mut self, current: TableVersion) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.version == current);
        self.order.retain(|key| key.version == current);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, %current, "purged stale views");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn insert(&mut self, key: ViewKey, view: Arc<DashboardView>) {
        while self.entries.len() >= self.max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_core::error::InvalidRangeError;
    use emissions_core::models::{EmissionsTable, Installation, YearRange};
    use emissions_data::dashboard::build_view;
    use std::collections::BTreeMap;

    fn table() -> EmissionsTable {
        EmissionsTable::with_years(
            &[2006, 2007],
            vec![Installation {
                id: "A".to_string(),
                name: "Plant A".to_string(),
                national_administrator: "FR".to_string(),
                latitude: None,
                longitude: None,
                emissions: BTreeMap::from([(2006, 100.0), (2007, 200.0)]),
                attributes: BTreeMap::new(),
            }],
        )
    }

    fn state(country: &str, start: u16, end: u16) -> FilterState {
        FilterState::new(
            country.to_string().into(),
            YearRange::new(start, end).unwrap(),
        )
    }

    fn version(n: u64) -> TableVersion {
        TableVersion::new(n)
    }

    #[test]
    fn test_miss_then_hit() {
        let table = table();
        let mut cache = ViewCache::default();
        let filter = state("All", 2006, 2007);
        let key = ViewKey::new(version(1), &filter);

        let first = cache
            .get_or_try_insert_with(key.clone(), || build_view(&table, &filter))
            .unwrap();
        let second = cache
            .get_or_try_insert_with(key, || -> Result<_, InvalidRangeError> {
                panic!("must not recompute on a hit")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_key_distinguishes_every_component() {
        let table = table();
        let mut cache = ViewCache::default();
        let filters = [
            state("All", 2006, 2007),
            state("FR", 2006, 2007),
            state("All", 2007, 2007),
            state("All", 2006, 2006),
        ];
        for filter in &filters {
            cache
                .get_or_try_insert_with(ViewKey::new(version(1), filter), || {
                    build_view(&table, filter)
                })
                .unwrap();
        }
        cache
            .get_or_try_insert_with(ViewKey::new(version(2), &filters[0]), || {
                build_view(&table, &filters[0])
            })
            .unwrap();

        assert_eq!(cache.len(), 5);
        assert_eq!(cache.misses(), 5);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let table = table();
        let mut cache = ViewCache::default();
        let filter = state("All", 2006, 2007);
        let bad = YearRange::new(2006, 2009).unwrap();
        let bad_filter = FilterState::new(CountryFilter::All, bad);

        let result =
            cache.get_or_try_insert_with(ViewKey::new(version(1), &bad_filter), || {
                build_view(&table, &bad_filter)
            });
        assert!(result.is_err());
        assert!(cache.is_empty());

        cache
            .get_or_try_insert_with(ViewKey::new(version(1), &filter), || {
                build_view(&table, &filter)
            })
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_stale_keeps_current_version() {
        let table = table();
        let mut cache = ViewCache::default();
        let filter = state("All", 2006, 2007);
        for v in 1..=3 {
            cache
                .get_or_try_insert_with(ViewKey::new(version(v), &filter), || {
                    build_view(&table, &filter)
                })
                .unwrap();
        }

        assert_eq!(cache.purge_stale(version(3)), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.entries.get(&ViewKey::new(version(3), &filter)).is_some());
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let table = table();
        let mut cache = ViewCache::new(2);
        let filters = [
            state("All", 2006, 2006),
            state("All", 2007, 2007),
            state("All", 2006, 2007),
        ];
        for filter in &filters {
            cache
                .get_or_try_insert_with(ViewKey::new(version(1), filter), || {
                    build_view(&table, filter)
                })
                .unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.entries.get(&ViewKey::new(version(1), &filters[0])).is_none());
        assert!(cache.entries.get(&ViewKey::new(version(1), &filters[2])).is_some());
    }
}
