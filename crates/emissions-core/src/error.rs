use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the emissions dataset from disk.
///
/// All of these are fatal at startup: the dashboard renders nothing when the
/// table cannot be loaded.
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// The dataset path does not exist.
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be opened or read.
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed delimited data.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The header row lacks one of the schema columns.
    #[error("Missing required column `{column}` in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// The header row has no year columns at all.
    #[error("No year columns found in {0}")]
    NoYearColumns(PathBuf),

    /// A cell could not be interpreted for its column.
    #[error("Invalid value {value:?} in column `{column}` at line {line} of {path}")]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    /// Two rows share the same installation identifier.
    #[error("Duplicate installation ID `{id}` at line {line} of {path}")]
    DuplicateId { path: PathBuf, id: String, line: u64 },
}

/// A requested year range that the loaded table cannot answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRangeError {
    /// `start` is later than `end`.
    #[error("Start year {start} is after end year {end}")]
    Reversed { start: u16, end: u16 },

    /// The table has no column for `year`.
    #[error("No emissions column for year {year}")]
    MissingYear { year: u16 },
}

/// All errors produced by the dashboard core.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
}

/// Convenience alias used throughout the emissions crates.
pub type Result<T> = std::result::Result<T, DashboardError>;
