//! Dashboard view model.
//!
//! [`build_view`] is the single entry point the presentation layer calls on
//! every filter change: it narrows the table by country and runs the
//! aggregations for the selected year range.

use emissions_core::error::InvalidRangeError;
use emissions_core::models::{EmissionsTable, FilterState, ALL_COUNTRIES};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::{EmissionsAggregator, RankedInstallation, YearlyTotals};

/// One line of the "Top Installations" table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopInstallationRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "InstallationNameOrAircraftOperatorCode")]
    pub name: String,
    #[serde(rename = "Total")]
    pub total: f64,
}

impl From<&RankedInstallation> for TopInstallationRow {
    fn from(ranked: &RankedInstallation) -> Self {
        Self {
            id: ranked.installation.id.clone(),
            name: ranked.installation.name.clone(),
            total: ranked.total,
        }
    }
}

/// Everything the dashboard renders for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filter: FilterState,
    /// Bar chart data.
    pub yearly_totals: YearlyTotals,
    /// "Total (all years, tons)" metric.
    pub grand_total: f64,
    /// Rows of the base table passing the country filter.
    pub filtered: EmissionsTable,
    /// Installations ranked by total over the range, highest first.
    pub top_installations: Vec<TopInstallationRow>,
}

impl DashboardView {
    /// Number of installations passing the country filter.
    pub fn installation_count(&self) -> usize {
        self.filtered.len()
    }
}

/// Build the view for `filter` from the base `table`.
pub fn build_view(
    table: &EmissionsTable,
    filter: &FilterState,
) -> Result<DashboardView, InvalidRangeError> {
    let filtered = EmissionsAggregator::filter_by_country(table, &filter.country);
    let yearly_totals = EmissionsAggregator::total_by_year(&filtered, filter.years)?;
    let top_installations = EmissionsAggregator::rank_installations(&filtered, filter.years)?
        .iter()
        .map(TopInstallationRow::from)
        .collect();

    debug!(
        country = %filter.country,
        years = %filter.years,
        rows = filtered.len(),
        "dashboard view built"
    );

    Ok(DashboardView {
        filter: filter.clone(),
        grand_total: yearly_totals.grand_total(),
        yearly_totals,
        filtered,
        top_installations,
    })
}

/// Options for the country selector: `"All"` followed by every country.
pub fn country_options(table: &EmissionsTable) -> Vec<String> {
    std::iter::once(ALL_COUNTRIES.to_string())
        .chain(EmissionsAggregator::distinct_countries(table))
        .collect()
}
