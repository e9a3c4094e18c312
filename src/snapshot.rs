//! Offline refresh job output: one JSON snapshot of every live metric per
//! source, written to a dated file plus `latest.json`. The fallback store
//! reads the latest snapshot back as its last-known-good table.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Clock;
use crate::error::DashboardError;
use crate::router::MetricRouter;
use crate::{Metric, MetricFilter, MetricRecord, Region};

/// Per-source refresh result. A source either yields its full metric map or
/// records the error that stopped it; partial maps are not written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceSnapshot {
    Ok { metrics: BTreeMap<String, MetricRecord> },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceSnapshot>,
}

impl Snapshot {
    pub fn failures(&self) -> usize {
        self.sources
            .values()
            .filter(|s| matches!(s, SourceSnapshot::Error { .. }))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.failures() == 0
    }
}

/// Query every registered source live, unfiltered and uncached. Failures
/// are recorded per source, never propagated; the refresh binary turns the
/// failure count into its exit code.
pub fn run_refresh(router: &MetricRouter, clock: &dyn Clock) -> Snapshot {
    let filter = MetricFilter::default();
    let mut sources = BTreeMap::new();

    for region in router.regions() {
        let Some(adapter) = router.adapter(region) else {
            continue;
        };
        let result = refresh_source(adapter, region, &filter);
        sources.insert(region.to_string(), result);
    }

    Snapshot {
        timestamp: clock.now(),
        sources,
    }
}

fn refresh_source(
    adapter: &dyn crate::adapters::SourceAdapter,
    region: Region,
    filter: &MetricFilter,
) -> SourceSnapshot {
    let mut metrics = BTreeMap::new();
    for metric in Metric::ALL {
        if !adapter.measures(metric) {
            continue;
        }
        match adapter.fetch_live(metric, filter) {
            Ok(record) => {
                metrics.insert(metric.to_string(), record);
            }
            Err(err) => {
                tracing::warn!(%region, %metric, error = %err, "refresh query failed");
                return SourceSnapshot::Error {
                    error: err.to_string(),
                };
            }
        }
    }
    tracing::info!(%region, metrics = metrics.len(), "source refreshed");
    SourceSnapshot::Ok { metrics }
}

/// Write the dated snapshot file and overwrite `latest.json`. Returns the
/// dated path.
pub fn write_snapshot(snapshot: &Snapshot, dir: &Path) -> Result<PathBuf, DashboardError> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(snapshot)?;

    let dated = dir.join(format!("metrics_{}.json", snapshot.timestamp.format("%Y-%m-%d")));
    fs::write(&dated, &json)?;
    fs::write(dir.join("latest.json"), &json)?;
    Ok(dated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedAdapter;
    use crate::cache::testing::ManualClock;
    use crate::fallback::FallbackStore;

    fn scripted_router() -> MetricRouter {
        let mut router = MetricRouter::new();
        router.register(Box::new(ScriptedAdapter::new(
            Region::Balochistan,
            Some(
                MetricRecord::active()
                    .with("total", 576.0)
                    .with_kind("AI + Human"),
            ),
        )));
        router.register(Box::new(ScriptedAdapter::new(Region::Rumi, None)));
        router
    }

    #[test]
    fn refresh_records_ok_and_error_sources() {
        let snapshot = run_refresh(&scripted_router(), &ManualClock::new());

        assert_eq!(snapshot.sources.len(), 2);
        assert_eq!(snapshot.failures(), 1);
        assert!(!snapshot.is_complete());

        match snapshot.sources.get("Balochistan").unwrap() {
            SourceSnapshot::Ok { metrics } => {
                assert_eq!(metrics.len(), Metric::ALL.len());
                assert_eq!(metrics["observations"].value("total"), Some(576.0));
            }
            other => panic!("expected ok source, got {:?}", other),
        }
        assert!(matches!(
            snapshot.sources.get("Rumi").unwrap(),
            SourceSnapshot::Error { .. }
        ));
    }

    #[test]
    fn snapshot_round_trips_through_the_fallback_store() {
        let snapshot = run_refresh(&scripted_router(), &ManualClock::new());
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(&snapshot, dir.path()).unwrap();

        let store = FallbackStore::load(&dir.path().join("latest.json")).unwrap();
        let record = store
            .record(Region::Balochistan, Metric::Observations)
            .unwrap();
        assert_eq!(record.value("total"), Some(576.0));
        // The failed source contributes nothing.
        assert!(store.record(Region::Rumi, Metric::Observations).is_none());
    }

    #[test]
    fn write_snapshot_emits_dated_and_latest_files() {
        let snapshot = run_refresh(&scripted_router(), &ManualClock::new());
        let dir = tempfile::tempdir().unwrap();
        let dated = write_snapshot(&snapshot, dir.path()).unwrap();

        assert_eq!(
            dated.file_name().unwrap().to_str().unwrap(),
            "metrics_2026-01-15.json"
        );
        assert!(dir.path().join("latest.json").exists());

        let raw = fs::read_to_string(dir.path().join("latest.json")).unwrap();
        let back: Snapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, snapshot);
    }
}
