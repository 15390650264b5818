mod bootstrap;
mod interactive;
mod report;

use std::io::{self, Write};

use anyhow::{Context, Result};
use emissions_core::settings::Settings;
use emissions_runtime::session::DashboardSession;

use crate::report::ReportOptions;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("CO2 dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        data_file = %settings.data_file.display(),
        country = %settings.country,
        start_year = settings.start_year,
        end_year = settings.end_year,
        "initial selection"
    );

    let filter = settings.filter_state()?;
    let mut session = DashboardSession::open(settings.data_file.clone(), filter)
        .with_context(|| format!("cannot open dataset {}", settings.data_file.display()))?;

    let options = ReportOptions::from(&settings);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let view = session.view()?;
    report::write_report(&mut out, &view, &options, session.table_version())?;

    if settings.interactive {
        interactive::run(&mut session, io::stdin().lock(), &mut out, &options)?;
        let (hits, misses) = session.cache_stats();
        let table_age_secs = session.table_age().map(|age| age.num_seconds());
        tracing::debug!(hits, misses, ?table_age_secs, "view cache statistics");
    }

    out.flush()?;
    Ok(())
}
