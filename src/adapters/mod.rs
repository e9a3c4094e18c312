//! Source adapters: one per regional program, each translating its upstream
//! store's native result shape into the common metric record.

mod balochistan;
mod ict;
mod moawin;
mod rawalpindi;
mod rumi;
mod warehouse;

pub use balochistan::BalochistanAdapter;
pub use ict::IctAdapter;
pub use moawin::MoawinAdapter;
pub use rawalpindi::RawalpindiAdapter;
pub use rumi::RumiAdapter;

use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::{Metric, MetricFilter, MetricRecord, Region, TimeWindow};

/// Contract every regional adapter satisfies so the router can drive five
/// heterogeneous stores through one code path.
///
/// `fetch_live` may fail; `fetch` may not. Dashboard usability is
/// prioritized over freshness signaling: any live failure is logged and
/// recovered with the declared last-known-good record, so no error ever
/// reaches the presentation layer.
pub trait SourceAdapter: Send + Sync {
    fn region(&self) -> Region;

    /// Whether this region has an instrument for the metric. Combined-mode
    /// aggregation and the offline refresh job only invoke measured
    /// metrics.
    fn measures(&self, metric: Metric) -> bool;

    /// Live query against the upstream store, normalized per the metric
    /// record invariant.
    fn fetch_live(
        &self,
        metric: Metric,
        filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError>;

    fn fallbacks(&self) -> &FallbackStore;

    /// Fail-open retrieval: never propagates an upstream failure.
    fn fetch(&self, metric: Metric, filter: &MetricFilter) -> MetricRecord {
        match self.fetch_live(metric, filter) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    region = %self.region(),
                    metric = %metric,
                    error = %err,
                    "live query failed, serving fallback"
                );
                self.fallbacks()
                    .record(self.region(), metric)
                    .unwrap_or_else(MetricRecord::no_data)
            }
        }
    }
}

/// Warehouse (BigQuery-dialect) time-window clause, prefixed with `AND`.
pub(crate) fn warehouse_window(window: TimeWindow, column: &str) -> String {
    match window {
        TimeWindow::AllTime => String::new(),
        TimeWindow::Last7Days => format!(
            "AND {} >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 7 DAY)",
            column
        ),
        TimeWindow::Last30Days => format!(
            "AND {} >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 30 DAY)",
            column
        ),
        TimeWindow::Last90Days => format!(
            "AND {} >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 90 DAY)",
            column
        ),
        TimeWindow::ThisYear => format!(
            "AND EXTRACT(YEAR FROM {}) = EXTRACT(YEAR FROM CURRENT_TIMESTAMP())",
            column
        ),
    }
}

/// PostgreSQL-dialect time-window clause, prefixed with `AND`.
pub(crate) fn pg_window(window: TimeWindow, column: &str) -> String {
    match window {
        TimeWindow::AllTime => String::new(),
        TimeWindow::Last7Days => format!("AND {} > NOW() - INTERVAL '7 days'", column),
        TimeWindow::Last30Days => format!("AND {} > NOW() - INTERVAL '30 days'", column),
        TimeWindow::Last90Days => format!("AND {} > NOW() - INTERVAL '90 days'", column),
        TimeWindow::ThisYear => format!(
            "AND EXTRACT(YEAR FROM {}) = EXTRACT(YEAR FROM NOW())",
            column
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedAdapter;
    use super::*;
    use crate::MetricStatus;
    use std::sync::atomic::Ordering;

    #[test]
    fn fetch_recovers_failure_with_declared_fallback() {
        let mut fallbacks = FallbackStore::empty();
        fallbacks.insert(
            Region::Rumi,
            Metric::Observations,
            MetricRecord::active().with("ai_count", 135.0),
        );
        let adapter = ScriptedAdapter::new(Region::Rumi, None).with_fallbacks(fallbacks);

        let record = adapter.fetch(Metric::Observations, &MetricFilter::default());
        assert_eq!(record.status, MetricStatus::Active);
        assert_eq!(record.value("ai_count"), Some(135.0));
        assert_eq!(record.note.as_deref(), Some(crate::fallback::FALLBACK_NOTE));
    }

    #[test]
    fn fetch_without_fallback_reports_no_data() {
        let adapter = ScriptedAdapter::new(Region::Rumi, None);
        let calls = adapter.calls();
        let record = adapter.fetch(Metric::Observations, &MetricFilter::default());
        assert_eq!(record.status, MetricStatus::NoData);
        assert!(record.values.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn window_clauses() {
        assert_eq!(warehouse_window(TimeWindow::AllTime, "ts"), "");
        assert!(warehouse_window(TimeWindow::Last7Days, "ts").contains("INTERVAL 7 DAY"));
        assert!(pg_window(TimeWindow::Last30Days, "created_at").contains("'30 days'"));
    }
}
