use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::InvalidRangeError;

/// Header of the installation identifier column.
pub const ID_COLUMN: &str = "ID";
/// Header of the installation / aircraft operator name column.
pub const NAME_COLUMN: &str = "InstallationNameOrAircraftOperatorCode";
/// Header of the national administrator (country) column.
pub const COUNTRY_COLUMN: &str = "NationalAdministrator";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// Columns every dataset must carry besides the year columns.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    ID_COLUMN,
    NAME_COLUMN,
    COUNTRY_COLUMN,
    LATITUDE_COLUMN,
    LONGITUDE_COLUMN,
];

/// First year offered by the year-range selector.
pub const FIRST_REPORTING_YEAR: u16 = 2006;
/// Last year offered by the year-range selector.
pub const LAST_REPORTING_YEAR: u16 = 2021;

/// Selector label meaning "no country narrowing".
pub const ALL_COUNTRIES: &str = "All";

// ── Installation ──────────────────────────────────────────────────────────────

/// One row of the emissions register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    pub id: String,
    pub name: String,
    /// National administrator code, used as the country.
    pub national_administrator: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Reported emissions in tons, keyed by year. Years the installation did
    /// not report are absent.
    pub emissions: BTreeMap<u16, f64>,
    /// Non-schema columns, keyed by header.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Installation {
    /// Emissions for `year`, or `None` when nothing was reported.
    pub fn emission(&self, year: u16) -> Option<f64> {
        self.emissions.get(&year).copied()
    }

    /// Sum of emissions over `range`; missing years count as zero.
    pub fn total_over(&self, range: YearRange) -> f64 {
        range
            .years()
            .filter_map(|year| self.emission(year))
            .sum()
    }

    /// Text rendering of the cell under `column`, empty when missing.
    pub fn cell(&self, column: &str) -> String {
        match column {
            ID_COLUMN => self.id.clone(),
            NAME_COLUMN => self.name.clone(),
            COUNTRY_COLUMN => self.national_administrator.clone(),
            LATITUDE_COLUMN => self.latitude.map(|v| v.to_string()).unwrap_or_default(),
            LONGITUDE_COLUMN => self.longitude.map(|v| v.to_string()).unwrap_or_default(),
            other => match other.parse::<u16>() {
                Ok(year) if is_year_header(other) => self
                    .emission(year)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                _ => self.attributes.get(other).cloned().unwrap_or_default(),
            },
        }
    }
}

/// `true` when `header` names a reporting year (exactly four ASCII digits).
pub fn is_year_header(header: &str) -> bool {
    header.len() == 4 && header.bytes().all(|b| b.is_ascii_digit())
}

// ── EmissionsTable ────────────────────────────────────────────────────────────

/// The in-memory emissions register.
///
/// Loaded once and never mutated; derived views are built from it (or from a
/// filtered copy produced by [`EmissionsTable::with_rows`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsTable {
    /// Header in file order.
    columns: Vec<String>,
    /// Year columns present in the header, ascending.
    years: Vec<u16>,
    rows: Vec<Installation>,
}

impl EmissionsTable {
    /// Build a table from a header and its rows.
    ///
    /// Year columns are derived from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Installation>) -> Self {
        let mut years: Vec<u16> = columns
            .iter()
            .filter(|c| is_year_header(c))
            .filter_map(|c| c.parse().ok())
            .collect();
        years.sort_unstable();
        years.dedup();
        Self {
            columns,
            years,
            rows,
        }
    }

    /// Build a table with the standard schema and the given year columns.
    pub fn with_years(years: &[u16], rows: Vec<Installation>) -> Self {
        let columns = REQUIRED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(years.iter().map(|y| y.to_string()))
            .collect();
        Self::new(columns, rows)
    }

    /// A table with the same schema holding `rows` instead.
    pub fn with_rows(&self, rows: Vec<Installation>) -> Self {
        Self {
            columns: self.columns.clone(),
            years: self.years.clone(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Year columns, ascending.
    pub fn years(&self) -> &[u16] {
        &self.years
    }

    pub fn has_year(&self, year: u16) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    pub fn rows(&self) -> &[Installation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that every year of `range` has a column in this table.
    pub fn check_range(&self, range: YearRange) -> Result<(), InvalidRangeError> {
        match range.years().find(|year| !self.has_year(*year)) {
            Some(year) => Err(InvalidRangeError::MissingYear { year }),
            None => Ok(()),
        }
    }
}

// ── YearRange ─────────────────────────────────────────────────────────────────

/// Inclusive range of reporting years, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    start: u16,
    end: u16,
}

impl YearRange {
    pub fn new(start: u16, end: u16) -> Result<Self, InvalidRangeError> {
        if start > end {
            return Err(InvalidRangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn years(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: FIRST_REPORTING_YEAR,
            end: LAST_REPORTING_YEAR,
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ── CountryFilter ─────────────────────────────────────────────────────────────

/// Country selection: every installation, or one national administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CountryFilter {
    #[default]
    All,
    Country(String),
}

impl CountryFilter {
    /// `true` when a row administered by `country` passes the filter.
    pub fn matches(&self, country: &str) -> bool {
        match self {
            CountryFilter::All => true,
            CountryFilter::Country(code) => code == country,
        }
    }

    /// Selector label, `"All"` or the country code.
    pub fn label(&self) -> &str {
        match self {
            CountryFilter::All => ALL_COUNTRIES,
            CountryFilter::Country(code) => code,
        }
    }
}

impl FromStr for CountryFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_COUNTRIES) {
            Ok(CountryFilter::All)
        } else {
            Ok(CountryFilter::Country(trimmed.to_string()))
        }
    }
}

impl From<String> for CountryFilter {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(filter) => filter,
            Err(never) => match never {},
        }
    }
}

impl From<CountryFilter> for String {
    fn from(filter: CountryFilter) -> Self {
        filter.label().to_string()
    }
}

impl fmt::Display for CountryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── FilterState ───────────────────────────────────────────────────────────────

/// The two inputs the presentation layer binds to: country and year range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    pub country: CountryFilter,
    pub years: YearRange,
}

impl FilterState {
    pub fn new(country: CountryFilter, years: YearRange) -> Self {
        Self { country, years }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test-only helper: `YearRange::len` was removed from the public API.
    impl YearRange {
        fn len(&self) -> usize {
            self.years().count()
        }
    }

    fn installation(id: &str, country: &str, emissions: &[(u16, f64)]) -> Installation {
        Installation {
            id: id.to_string(),
            name: format!("Plant {id}"),
            national_administrator: country.to_string(),
            latitude: Some(48.5),
            longitude: None,
            emissions: emissions.iter().copied().collect(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_year_range_rejects_reversed() {
        assert_eq!(
            YearRange::new(2010, 2009),
            Err(InvalidRangeError::Reversed {
                start: 2010,
                end: 2009
            })
        );
    }

    #[test]
    fn test_year_range_years() {
        let range = YearRange::new(2006, 2008).unwrap();
        assert_eq!(range.years().count(), 3);
        assert_eq!(range.years().collect::<Vec<_>>(), vec![2006, 2007, 2008]);
        assert_eq!(range.to_string(), "2006-2008");

        let single = YearRange::new(2012, 2012).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_year_range_default_is_selector_domain() {
        let range = YearRange::default();
        assert_eq!(range.start(), 2006);
        assert_eq!(range.end(), 2021);
        assert_eq!(range.years().count(), 16);
    }

    #[test]
    fn test_country_filter_parse() {
        assert_eq!("All".parse::<CountryFilter>().unwrap(), CountryFilter::All);
        assert_eq!("all".parse::<CountryFilter>().unwrap(), CountryFilter::All);
        assert_eq!("".parse::<CountryFilter>().unwrap(), CountryFilter::All);
        assert_eq!(
            " FR ".parse::<CountryFilter>().unwrap(),
            CountryFilter::Country("FR".to_string())
        );
    }

    #[test]
    fn test_country_filter_matches() {
        let fr = CountryFilter::Country("FR".to_string());
        assert!(fr.matches("FR"));
        assert!(!fr.matches("DE"));
        assert!(CountryFilter::All.matches("DE"));
    }

    #[test]
    fn test_country_filter_serializes_as_label() {
        let json = serde_json::to_string(&CountryFilter::Country("DE".to_string())).unwrap();
        assert_eq!(json, "\"DE\"");
        let back: CountryFilter = serde_json::from_str("\"All\"").unwrap();
        assert_eq!(back, CountryFilter::All);
    }

    #[test]
    fn test_installation_total_treats_missing_as_zero() {
        let row = installation("A", "FR", &[(2006, 100.0), (2008, 25.0)]);
        let range = YearRange::new(2006, 2008).unwrap();
        assert_eq!(row.total_over(range), 125.0);
        assert_eq!(row.emission(2007), None);
    }

    #[test]
    fn test_installation_cell_rendering() {
        let mut row = installation("A", "FR", &[(2006, 100.0)]);
        row.attributes
            .insert("RegistryCode".to_string(), "FR-1".to_string());
        assert_eq!(row.cell(ID_COLUMN), "A");
        assert_eq!(row.cell(COUNTRY_COLUMN), "FR");
        assert_eq!(row.cell(LATITUDE_COLUMN), "48.5");
        assert_eq!(row.cell(LONGITUDE_COLUMN), "");
        assert_eq!(row.cell("2006"), "100");
        assert_eq!(row.cell("2007"), "");
        assert_eq!(row.cell("RegistryCode"), "FR-1");
    }

    #[test]
    fn test_table_years_from_header() {
        let columns = vec![
            "2008".to_string(),
            ID_COLUMN.to_string(),
            "2006".to_string(),
            "Notes".to_string(),
        ];
        let table = EmissionsTable::new(columns, Vec::new());
        assert_eq!(table.years(), &[2006, 2008]);
        assert!(table.has_year(2006));
        assert!(!table.has_year(2007));
        assert!(table.is_empty());
    }

    #[test]
    fn test_table_check_range() {
        let table = EmissionsTable::with_years(&[2006, 2007], Vec::new());
        assert!(table.check_range(YearRange::new(2006, 2007).unwrap()).is_ok());
        assert_eq!(
            table.check_range(YearRange::new(2006, 2008).unwrap()),
            Err(InvalidRangeError::MissingYear { year: 2008 })
        );
    }

    #[test]
    fn test_with_rows_keeps_schema() {
        let table = EmissionsTable::with_years(
            &[2006],
            vec![installation("A", "FR", &[(2006, 1.0)])],
        );
        let empty = table.with_rows(Vec::new());
        assert_eq!(empty.columns(), table.columns());
        assert_eq!(empty.years(), table.years());
        assert!(empty.is_empty());
    }
}
