use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::InvalidRangeError;
use crate::models::{
    CountryFilter, FilterState, YearRange, FIRST_REPORTING_YEAR, LAST_REPORTING_YEAR,
};

/// Dataset read when `--data-file` is not given.
pub const DEFAULT_DATA_FILE: &str = "ArcelorMittal_CO2_Emissions.csv";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Explore EU ETS register data on CO2 emissions
#[derive(Parser, Debug, Clone)]
#[command(
    name = "co2-dashboard",
    about = "Explore EU ETS register data on CO2 emissions",
    version
)]
pub struct Settings {
    /// Emissions CSV file
    #[arg(long, env = "CO2_DASHBOARD_DATA", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    /// Country (national administrator code) or "All"
    #[arg(long, default_value = "All")]
    pub country: String,

    /// First year of the range
    #[arg(
        long,
        default_value_t = FIRST_REPORTING_YEAR,
        value_parser = clap::value_parser!(u16).range(i64::from(FIRST_REPORTING_YEAR)..=i64::from(LAST_REPORTING_YEAR))
    )]
    pub start_year: u16,

    /// Last year of the range
    #[arg(
        long,
        default_value_t = LAST_REPORTING_YEAR,
        value_parser = clap::value_parser!(u16).range(i64::from(FIRST_REPORTING_YEAR)..=i64::from(LAST_REPORTING_YEAR))
    )]
    pub end_year: u16,

    /// Only show the N highest-emitting installations
    #[arg(long)]
    pub top: Option<usize>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Also print the filtered raw data
    #[arg(long)]
    pub show_data: bool,

    /// Read filter commands from stdin after the first report
    #[arg(long)]
    pub interactive: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.co2-dashboard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".co2-dashboard").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable last-used file");
            Self::default()
        })
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear last-used settings");
            }
            return settings.apply_debug();
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI (and env) always win over persisted values.
        if !is_arg_explicitly_set(&matches, "data_file") {
            if let Some(v) = last.data_file.clone().filter(|p| p.is_file()) {
                settings.data_file = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "country") {
            if let Some(v) = last.country {
                settings.country = v;
            }
        }
        // The saved range is only reused as a whole.
        if !is_arg_explicitly_set(&matches, "start_year")
            && !is_arg_explicitly_set(&matches, "end_year")
        {
            if let Some((start, end)) = persisted_range(last.start_year, last.end_year) {
                settings.start_year = start;
                settings.end_year = end;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format.filter(|f| f == "text" || f == "json") {
                settings.format = v;
            }
        }

        settings = settings.apply_debug();

        if let Err(e) = settings.filter_state() {
            tracing::warn!(error = %e, "not persisting an invalid selection");
            return settings;
        }

        let mut params = LastUsedParams::from(&settings);
        if !settings.data_file.is_file() {
            params.data_file = last.data_file;
        }
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!(error = %e, "failed to persist last-used settings");
        }

        settings
    }

    /// The filter selected on the command line.
    ///
    /// Fails when `--start-year` is after `--end-year`.
    pub fn filter_state(&self) -> Result<FilterState, InvalidRangeError> {
        let years = YearRange::new(self.start_year, self.end_year)?;
        let country: CountryFilter = self.country.clone().into();
        Ok(FilterState::new(country, years))
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data_file: Some(s.data_file.clone()),
            country: Some(s.country.clone()),
            start_year: Some(s.start_year),
            end_year: Some(s.end_year),
            format: Some(s.format.clone()),
        }
    }
}

fn in_selector_domain(year: u16) -> bool {
    (FIRST_REPORTING_YEAR..=LAST_REPORTING_YEAR).contains(&year)
}

/// A saved `(start, end)` pair, when both are present, in the selector domain
/// and ordered.
fn persisted_range(start: Option<u16>, end: Option<u16>) -> Option<(u16, u16)> {
    let (start, end) = (start?, end?);
    (in_selector_domain(start) && in_selector_domain(end) && start <= end).then_some((start, end))
}

/// Returns `true` when `name` was supplied explicitly on the command line or
/// through its environment variable.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine | clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
