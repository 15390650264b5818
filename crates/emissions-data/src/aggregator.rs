//! Emission aggregation over a year range.
//!
//! Everything here is a pure function of an [`EmissionsTable`]: yearly
//! totals, installations ranked by total emissions, the distinct country
//! list, and the country filter that narrows a table before aggregation.

use std::collections::BTreeSet;

use emissions_core::error::InvalidRangeError;
use emissions_core::models::{CountryFilter, EmissionsTable, Installation, YearRange};
use serde::Serialize;

// ── YearlyTotals ──────────────────────────────────────────────────────────────

/// Summed emissions for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearTotal {
    pub year: u16,
    /// Tons of CO2 across all installations.
    pub total: f64,
}

/// Per-year totals for a range, ascending by year with one entry per year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTotals {
    range: YearRange,
    totals: Vec<YearTotal>,
}

impl YearlyTotals {
    pub fn entries(&self) -> &[YearTotal] {
        &self.totals
    }

    pub fn iter(&self) -> impl Iterator<Item = &YearTotal> {
        self.totals.iter()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Total for `year`, `None` outside the range.
    pub fn get(&self, year: u16) -> Option<f64> {
        self.totals
            .iter()
            .find(|t| t.year == year)
            .map(|t| t.total)
    }

    /// Sum of every per-year total; the dashboard's summary metric.
    pub fn grand_total(&self) -> f64 {
        self.totals.iter().map(|t| t.total).sum()
    }

    /// Largest single-year total, `0.0` when every year is empty.
    pub fn peak(&self) -> f64 {
        self.totals.iter().map(|t| t.total).fold(0.0, f64::max)
    }
}

// ── RankedInstallation ────────────────────────────────────────────────────────

/// An installation together with its emissions summed over a year range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedInstallation {
    #[serde(flatten)]
    pub installation: Installation,
    #[serde(rename = "Total")]
    pub total: f64,
}

// ── EmissionsAggregator ───────────────────────────────────────────────────────

/// Stateless helper computing the dashboard's derived views.
pub struct EmissionsAggregator;

impl EmissionsAggregator {
    /// Sum each year of `range` across every row of `table`.
    ///
    /// Missing values contribute zero. Fails when a year of the range has no
    /// column in the table.
    pub fn total_by_year(
        table: &EmissionsTable,
        range: YearRange,
    ) -> Result<YearlyTotals, InvalidRangeError> {
        table.check_range(range)?;

        let totals = range
            .years()
            .map(|year| YearTotal {
                year,
                total: table.rows().iter().filter_map(|r| r.emission(year)).sum(),
            })
            .collect();

        Ok(YearlyTotals { range, totals })
    }

    /// Every row of `table` with its total over `range`, highest first.
    ///
    /// The sort is stable: rows with equal totals keep their table order.
    pub fn rank_installations(
        table: &EmissionsTable,
        range: YearRange,
    ) -> Result<Vec<RankedInstallation>, InvalidRangeError> {
        table.check_range(range)?;

        let mut ranked: Vec<RankedInstallation> = table
            .rows()
            .iter()
            .map(|row| RankedInstallation {
                total: row.total_over(range),
                installation: row.clone(),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranked)
    }

    /// Distinct national administrators, sorted ascending.
    pub fn distinct_countries(table: &EmissionsTable) -> Vec<String> {
        table
            .rows()
            .iter()
            .map(|r| r.national_administrator.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Rows of `table` passing `filter`, in their original order.
    pub fn filter_by_country(table: &EmissionsTable, filter: &CountryFilter) -> EmissionsTable {
        let rows = table
            .rows()
            .iter()
            .filter(|r| filter.matches(&r.national_administrator))
            .cloned()
            .collect();
        table.with_rows(rows)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
