//! Text and JSON rendering of a [`DashboardView`].

use std::io::Write;
use std::path::PathBuf;

use emissions_core::formatting::format_tons;
use emissions_core::settings::Settings;
use emissions_data::aggregator::YearTotal;
use emissions_data::dashboard::{DashboardView, TopInstallationRow};
use emissions_runtime::data_manager::TableVersion;
use serde::Serialize;

/// Width of the longest bar in the yearly chart.
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Presentation switches taken from the command line.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub format: ReportFormat,
    /// Limit on the ranking rows; `None` shows every installation.
    pub top: Option<usize>,
    pub show_data: bool,
    pub data_file: PathBuf,
}

impl From<&Settings> for ReportOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            format: if settings.format == "json" {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            },
            top: settings.top,
            show_data: settings.show_data,
            data_file: settings.data_file.clone(),
        }
    }
}

// ── JSON ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    data_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    table_version: Option<u64>,
    country: &'a str,
    start_year: u16,
    end_year: u16,
    installation_count: usize,
    total_by_year: &'a [YearTotal],
    #[serde(rename = "total_all_years_tons")]
    grand_total: f64,
    top_installations: &'a [TopInstallationRow],
}

impl<'a> JsonReport<'a> {
    fn new(view: &'a DashboardView, options: &ReportOptions, version: Option<TableVersion>) -> Self {
        Self {
            data_file: options.data_file.display().to_string(),
            table_version: version.map(|v| v.get()),
            country: view.filter.country.label(),
            start_year: view.filter.years.start(),
            end_year: view.filter.years.end(),
            installation_count: view.installation_count(),
            total_by_year: view.yearly_totals.entries(),
            grand_total: view.grand_total,
            top_installations: top_rows(view, options.top),
        }
    }
}

// ── Rendering ──────────────────────────────────────────────────────────────────

/// Write `view` to `out` in the selected format.
pub fn write_report<W: Write>(
    out: &mut W,
    view: &DashboardView,
    options: &ReportOptions,
    version: Option<TableVersion>,
) -> anyhow::Result<()> {
    match options.format {
        ReportFormat::Text => out.write_all(render_text(view, options).as_bytes())?,
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &JsonReport::new(view, options, version))?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// The dashboard as plain text.
pub fn render_text(view: &DashboardView, options: &ReportOptions) -> String {
    let mut text = String::new();

    text.push_str("CO2 Emissions Dashboard\n");
    text.push_str(&format!(
        "Country: {}  Years: {}  Installations: {}\n\n",
        view.filter.country,
        view.filter.years,
        view.installation_count()
    ));

    text.push_str("Total by year\n");
    let peak = view.yearly_totals.peak();
    for entry in view.yearly_totals.iter() {
        text.push_str(&format!(
            "{} | {:<width$} {}\n",
            entry.year,
            bar(entry.total, peak),
            format_tons(entry.total),
            width = BAR_WIDTH
        ));
    }

    text.push_str(&format!(
        "\nTotal (all years, tons): {}\n",
        format_tons(view.grand_total)
    ));

    if options.show_data {
        text.push_str("\nRaw data\n");
        let rows: Vec<Vec<String>> = std::iter::once(view.filtered.columns().to_vec())
            .chain(view.filtered.rows().iter().map(|row| {
                view.filtered
                    .columns()
                    .iter()
                    .map(|c| row.cell(c))
                    .collect()
            }))
            .collect();
        push_columns(&mut text, &rows, &[]);
    }

    text.push_str("\nTop Installations\n");
    let rows: Vec<Vec<String>> = std::iter::once(vec![
        "ID".to_string(),
        "InstallationNameOrAircraftOperatorCode".to_string(),
        "Total".to_string(),
    ])
    .chain(
        top_rows(view, options.top)
            .iter()
            .map(|r| vec![r.id.clone(), r.name.clone(), format_tons(r.total)]),
    )
    .collect();
    push_columns(&mut text, &rows, &[2]);

    text
}

fn top_rows(view: &DashboardView, top: Option<usize>) -> &[TopInstallationRow] {
    let rows = view.top_installations.as_slice();
    match top {
        Some(n) => &rows[..n.min(rows.len())],
        None => rows,
    }
}

/// Bar scaled so that `peak` fills [`BAR_WIDTH`].
fn bar(value: f64, peak: f64) -> String {
    if peak <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / peak) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.clamp(1, BAR_WIDTH))
}

/// Append `rows` as aligned columns; indices in `right` are right-aligned.
fn push_columns(text: &mut String, rows: &[Vec<String>], right: &[usize]) {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if right.contains(&i) {
                    format!("{:>w$}", cell, w = widths[i])
                } else {
                    format!("{:<w$}", cell, w = widths[i])
                }
            })
            .collect();
        text.push_str(line.join("  ").trim_end());
        text.push('\n');
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_core::models::{EmissionsTable, FilterState, Installation, YearRange};
    use emissions_data::dashboard::build_view;
    use std::collections::BTreeMap;

    fn row(id: &str, country: &str, emissions: &[(u16, f64)]) -> Installation {
        Installation {
            id: id.to_string(),
            name: format!("Works {id}"),
            national_administrator: country.to_string(),
            latitude: Some(50.0),
            longitude: None,
            emissions: emissions.iter().copied().collect(),
            attributes: BTreeMap::new(),
        }
    }

    fn view(country: &str) -> DashboardView {
        let table = EmissionsTable::with_years(
            &[2006, 2007],
            vec![
                row("A", "FR", &[(2006, 1000.0), (2007, 2000.0)]),
                row("B", "DE", &[(2006, 500.0), (2007, 0.0)]),
                row("C", "FR", &[]),
            ],
        );
        let filter = FilterState::new(
            country.to_string().into(),
            YearRange::new(2006, 2007).unwrap(),
        );
        build_view(&table, &filter).unwrap()
    }

    fn options(format: ReportFormat) -> ReportOptions {
        ReportOptions {
            format,
            top: None,
            show_data: false,
            data_file: PathBuf::from("emissions.csv"),
        }
    }

    #[test]
    fn test_render_text_sections() {
        let text = render_text(&view("All"), &options(ReportFormat::Text));

        assert!(text.contains("Country: All  Years: 2006-2007  Installations: 3"));
        assert!(text.contains("Total by year"));
        assert!(text.contains("Total (all years, tons): 3,500"));
        assert!(text.contains("Top Installations"));
        assert!(!text.contains("Raw data"));
    }

    #[test]
    fn test_render_text_bars_scale_to_peak() {
        let text = render_text(&view("All"), &options(ReportFormat::Text));
        let bar_len = |year: &str| {
            text.lines()
                .find(|l| l.starts_with(year))
                .map(|l| l.matches('█').count())
                .unwrap()
        };
        assert_eq!(bar_len("2007"), BAR_WIDTH);
        assert_eq!(bar_len("2006"), 30);
    }

    #[test]
    fn test_render_text_ranking_order_and_limit() {
        let mut opts = options(ReportFormat::Text);
        opts.top = Some(2);
        let text = render_text(&view("All"), &opts);

        let ranking: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "Top Installations")
            .skip(2)
            .collect();
        assert_eq!(ranking.len(), 2);
        assert!(ranking[0].starts_with("A "));
        assert!(ranking[0].ends_with("3,000"));
        assert!(ranking[1].starts_with("B "));
    }

    #[test]
    fn test_render_text_show_data() {
        let mut opts = options(ReportFormat::Text);
        opts.show_data = true;
        let text = render_text(&view("FR"), &opts);

        assert!(text.contains("Raw data"));
        assert!(text.contains("NationalAdministrator"));
        assert!(text.contains("Works C"));
        assert!(!text.contains("Works B"));
    }

    #[test]
    fn test_bar_edge_cases() {
        assert_eq!(bar(0.0, 0.0), "");
        assert_eq!(bar(0.0, 10.0), "");
        assert_eq!(bar(0.001, 1000.0).chars().count(), 1);
        assert_eq!(bar(10.0, 10.0).chars().count(), BAR_WIDTH);
    }

    #[test]
    fn test_write_report_json() {
        let mut out = Vec::new();
        write_report(
            &mut out,
            &view("DE"),
            &options(ReportFormat::Json),
            None,
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["country"], "DE");
        assert_eq!(json["start_year"], 2006);
        assert_eq!(json["installation_count"], 1);
        assert_eq!(json["total_all_years_tons"], 500.0);
        assert_eq!(json["total_by_year"][0]["year"], 2006);
        assert_eq!(json["top_installations"][0]["ID"], "B");
        assert!(json.get("table_version").is_none());
    }
}
