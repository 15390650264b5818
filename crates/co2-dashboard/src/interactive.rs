//! Line-oriented filter commands read from stdin.
//!
//! Every command that changes the selection is turned into a
//! [`FilterEvent`] and handed to the session; the refreshed report is then
//! written out.

use std::io::{BufRead, Write};

use anyhow::bail;
use emissions_core::models::{CountryFilter, YearRange};
use emissions_runtime::session::{DashboardSession, FilterEvent};

use crate::report::{write_report, ReportOptions};

const HELP: &str = "\
Commands:
  country <CODE|All>   filter by national administrator
  years <START> <END>  select the year range
  reload               re-read the dataset
  show                 print the current report
  countries            list selectable countries
  help                 show this help
  quit                 exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Apply(FilterEvent),
    Show,
    Countries,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_lowercase().as_str(), args.as_slice()) {
        ("country", [code]) => Command::Apply(FilterEvent::SelectCountry(
            code.parse::<CountryFilter>()?,
        )),
        ("country", _) => bail!("usage: country <CODE|All>"),
        ("years", [start, end]) => {
            let start: u16 = start.parse().map_err(|_| invalid_year(start))?;
            let end: u16 = end.parse().map_err(|_| invalid_year(end))?;
            Command::Apply(FilterEvent::SelectYears(YearRange::new(start, end)?))
        }
        ("years", _) => bail!("usage: years <START> <END>"),
        ("reload", []) => Command::Apply(FilterEvent::Reload),
        ("show", []) => Command::Show,
        ("countries", []) => Command::Countries,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (other, _) => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}

fn invalid_year(value: &str) -> anyhow::Error {
    anyhow::anyhow!("'{value}' is not a year")
}

/// Read commands from `input` until `quit` or end of input.
///
/// Rejected commands are reported on `out` and the session keeps its
/// previous selection.
pub fn run<R: BufRead, W: Write>(
    session: &mut DashboardSession,
    input: R,
    out: &mut W,
    options: &ReportOptions,
) -> anyhow::Result<()> {
    writeln!(out, "Type 'help' for commands.")?;

    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => out.write_all(HELP.as_bytes())?,
            Command::Countries => match session.country_options() {
                Ok(countries) => writeln!(out, "{}", countries.join(", "))?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Command::Show => match session.view() {
                Ok(view) => write_report(out, &view, options, session.table_version())?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Command::Apply(event) => match session.apply(event) {
                Ok(view) => write_report(out, &view, options, session.table_version())?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
        }
    }

    Ok(())
}
