//! Offline refresh job: queries every source live and writes the JSON
//! snapshot the dashboard's fallback store reads back.
//!
//! Exit codes: 0 all sources refreshed, 1 at least one source failed,
//! 2 configuration or filesystem error.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use obsdash::cache::SystemClock;
use obsdash::config::DashboardConfig;
use obsdash::fallback::FallbackStore;
use obsdash::router::MetricRouter;
use obsdash::snapshot::{run_refresh, write_snapshot, Snapshot};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(snapshot) if snapshot.is_complete() => ExitCode::SUCCESS,
        Ok(snapshot) => {
            tracing::error!(
                failures = snapshot.failures(),
                sources = snapshot.sources.len(),
                "refresh completed with failed sources"
            );
            ExitCode::from(1)
        }
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "refresh aborted");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<Snapshot> {
    let config = DashboardConfig::from_env().context("loading store configuration")?;
    let router = MetricRouter::from_config(&config, Arc::new(FallbackStore::builtin()));

    let snapshot = run_refresh(&router, &SystemClock);
    let path = write_snapshot(&snapshot, &config.cache_dir)
        .with_context(|| format!("writing snapshot to {}", config.cache_dir.display()))?;
    tracing::info!(
        path = %path.display(),
        sources = snapshot.sources.len(),
        failures = snapshot.failures(),
        "snapshot written"
    );
    Ok(snapshot)
}
