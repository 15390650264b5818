//! CSV loading for the emissions register.
//!
//! Reads a delimited file with a header row into an [`EmissionsTable`],
//! keeping the header order and parsing every four-digit year column as a
//! tonnage.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use emissions_core::error::DataLoadError;
use emissions_core::models::{
    is_year_header, EmissionsTable, Installation, COUNTRY_COLUMN, ID_COLUMN, LATITUDE_COLUMN,
    LONGITUDE_COLUMN, NAME_COLUMN,
};
use tracing::{debug, info};

/// Cell spellings read as "no value", matching common spreadsheet exports.
const MISSING_MARKERS: [&str; 10] = [
    "", "NA", "N/A", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A",
];

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the emissions table stored at `path`.
pub fn load_table(path: &Path) -> Result<EmissionsTable, DataLoadError> {
    if !path.exists() {
        return Err(DataLoadError::NotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path).map_err(|source| DataLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let started = std::time::Instant::now();
    let table = read_table(file, path)?;

    info!(
        path = %path.display(),
        rows = table.len(),
        first_year = table.years().first().copied(),
        last_year = table.years().last().copied(),
        "loaded emissions table"
    );
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "csv parse finished");

    Ok(table)
}

/// Parse an emissions table from any reader.
///
/// `source` is only used in error messages.
pub fn read_table<R: Read>(reader: R, source: &Path) -> Result<EmissionsTable, DataLoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(source, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let layout = ColumnLayout::from_headers(&headers, source)?;

    let mut rows: Vec<Installation> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(source, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let installation = layout.parse_record(&record, line, source)?;

        if !seen_ids.insert(installation.id.clone()) {
            return Err(DataLoadError::DuplicateId {
                path: source.to_path_buf(),
                id: installation.id,
                line,
            });
        }
        rows.push(installation);
    }

    Ok(EmissionsTable::new(headers, rows))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Column positions resolved once from the header row.
struct ColumnLayout {
    id: usize,
    name: usize,
    country: usize,
    latitude: usize,
    longitude: usize,
    years: Vec<(usize, u16)>,
    attributes: Vec<(usize, String)>,
}

impl ColumnLayout {
    fn from_headers(headers: &[String], source: &Path) -> Result<Self, DataLoadError> {
        let position = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| DataLoadError::MissingColumn {
                    path: source.to_path_buf(),
                    column: column.to_string(),
                })
        };

        let id = position(ID_COLUMN)?;
        let name = position(NAME_COLUMN)?;
        let country = position(COUNTRY_COLUMN)?;
        let latitude = position(LATITUDE_COLUMN)?;
        let longitude = position(LONGITUDE_COLUMN)?;
        let known = [id, name, country, latitude, longitude];

        let mut years = Vec::new();
        let mut attributes = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if known.contains(&idx) {
                continue;
            }
            match header.parse::<u16>() {
                Ok(year) if is_year_header(header) => years.push((idx, year)),
                _ => attributes.push((idx, header.clone())),
            }
        }

        if years.is_empty() {
            return Err(DataLoadError::NoYearColumns(source.to_path_buf()));
        }

        Ok(Self {
            id,
            name,
            country,
            latitude,
            longitude,
            years,
            attributes,
        })
    }

    fn parse_record(
        &self,
        record: &csv::StringRecord,
        line: u64,
        source: &Path,
    ) -> Result<Installation, DataLoadError> {
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let invalid = |idx: usize, column: &str| DataLoadError::InvalidValue {
            path: source.to_path_buf(),
            line,
            column: column.to_string(),
            value: field(idx).to_string(),
        };

        let id = field(self.id);
        if is_missing(id) {
            return Err(invalid(self.id, ID_COLUMN));
        }

        let latitude =
            parse_optional(field(self.latitude)).ok_or_else(|| invalid(self.latitude, LATITUDE_COLUMN))?;
        let longitude = parse_optional(field(self.longitude))
            .ok_or_else(|| invalid(self.longitude, LONGITUDE_COLUMN))?;

        let mut emissions = BTreeMap::new();
        for &(idx, year) in &self.years {
            let tons = parse_optional(field(idx))
                .filter(|v| v.map_or(true, |t| t.is_finite() && t >= 0.0))
                .ok_or_else(|| invalid(idx, &year.to_string()))?;
            if let Some(tons) = tons {
                emissions.insert(year, tons);
            }
        }

        let attributes = self
            .attributes
            .iter()
            .map(|(idx, header)| (header.clone(), field(*idx).to_string()))
            .collect();

        Ok(Installation {
            id: id.to_string(),
            name: field(self.name).to_string(),
            national_administrator: field(self.country).to_string(),
            latitude,
            longitude,
            emissions,
            attributes,
        })
    }
}

fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw)
}

/// `Some(None)` for a missing cell, `Some(Some(v))` for a number, `None` when
/// the cell is neither.
fn parse_optional(raw: &str) -> Option<Option<f64>> {
    if is_missing(raw) {
        return Some(None);
    }
    raw.parse::<f64>().ok().map(Some)
}

fn csv_error(path: &Path, err: csv::Error) -> DataLoadError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => DataLoadError::Read {
            path: path.to_path_buf(),
            source,
        },
        _ => DataLoadError::Parse {
            path: path.to_path_buf(),
            message,
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    const HEADER: &str =
        "ID,InstallationNameOrAircraftOperatorCode,NationalAdministrator,Latitude,Longitude,2006,2007";

    fn parse(body: &str) -> Result<EmissionsTable, DataLoadError> {
        read_table(body.as_bytes(), Path::new("test.csv"))
    }

    #[test]
    fn test_reads_schema_and_rows() {
        let csv = format!("{HEADER}\nA,Plant A,FR,48.1,2.3,100,200\nB,Plant B,DE,,,50,0\n");
        let table = parse(&csv).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.years(), &[2006, 2007]);
        assert_eq!(table.columns().len(), 7);
        assert_eq!(table.columns()[0], "ID");

        let a = &table.rows()[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.name, "Plant A");
        assert_eq!(a.national_administrator, "FR");
        assert_eq!(a.latitude, Some(48.1));
        assert_eq!(a.emission(2007), Some(200.0));

        let b = &table.rows()[1];
        assert_eq!(b.latitude, None);
        assert_eq!(b.emission(2007), Some(0.0));
    }

    #[test]
    fn test_missing_year_values_are_absent() {
        let csv = format!("{HEADER}\nA,Plant A,FR,1,2,100,\nB,Plant B,FR,1,2,NaN,7\n");
        let table = parse(&csv).unwrap();
        assert_eq!(table.rows()[0].emission(2007), None);
        assert_eq!(table.rows()[1].emission(2006), None);
        assert_eq!(table.rows()[1].emission(2007), Some(7.0));
    }

    #[test]
    fn test_keeps_extra_columns_as_attributes() {
        let csv = "RegistryCode,ID,InstallationNameOrAircraftOperatorCode,NationalAdministrator,Latitude,Longitude,2006\n\
                   FR-1,A,Plant A,FR,1,2,5\n";
        let table = parse(csv).unwrap();
        assert_eq!(table.columns()[0], "RegistryCode");
        assert_eq!(table.rows()[0].cell("RegistryCode"), "FR-1");
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "ID,NationalAdministrator,Latitude,Longitude,2006\nA,FR,1,2,3\n";
        let err = parse(csv).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::MissingColumn { ref column, .. } if column == NAME_COLUMN
        ));
    }

    #[test]
    fn test_no_year_columns_is_error() {
        let csv = "ID,InstallationNameOrAircraftOperatorCode,NationalAdministrator,Latitude,Longitude\n";
        assert!(matches!(parse(csv), Err(DataLoadError::NoYearColumns(_))));
    }

    #[test]
    fn test_non_numeric_emission_is_error() {
        let csv = format!("{HEADER}\nA,Plant A,FR,1,2,100,lots\n");
        match parse(&csv).unwrap_err() {
            DataLoadError::InvalidValue {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(column, "2007");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_emission_is_error() {
        let csv = format!("{HEADER}\nA,Plant A,FR,1,2,-5,1\n");
        assert!(matches!(
            parse(&csv),
            Err(DataLoadError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_duplicate_id_is_error() {
        let csv = format!("{HEADER}\nA,Plant A,FR,1,2,1,1\nA,Plant A2,DE,1,2,1,1\n");
        match parse(&csv).unwrap_err() {
            DataLoadError::DuplicateId { id, line, .. } => {
                assert_eq!(id, "A");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_row_is_parse_error() {
        let csv = format!("{HEADER}\nA,Plant A,FR,1,2,1\n");
        assert!(matches!(parse(&csv), Err(DataLoadError::Parse { .. })));
    }

    #[test]
    fn test_load_table_missing_path() {
        let path = PathBuf::from("/definitely/not/here/emissions.csv");
        assert!(matches!(
            load_table(&path),
            Err(DataLoadError::NotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_load_table_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "A,Plant A,FR,48.1,2.3,100,200").unwrap();
        file.flush().unwrap();

        let table = load_table(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].total_over(
            emissions_core::models::YearRange::new(2006, 2007).unwrap()
        ), 300.0);
    }

    #[test]
    fn test_header_only_yields_empty_table() {
        let table = parse(&format!("{HEADER}\n")).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.years(), &[2006, 2007]);
    }
}
