//! RWP adapter: reads the warehouse unified views for the Rawalpindi
//! program. Observation coaching has not deployed yet, so the observation
//! metric reports `launching` rather than a zero count.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::store::{f64_col, HttpStore};
use crate::{Metric, MetricFilter, MetricRecord, Region};

use super::warehouse::{engagement_record, retention_record};
use super::SourceAdapter;

const PROGRAM: &str = "rawalpindi";

pub struct RawalpindiAdapter {
    warehouse: HttpStore,
    fallbacks: Arc<FallbackStore>,
}

impl RawalpindiAdapter {
    pub fn new(warehouse: &StoreConfig, fallbacks: Arc<FallbackStore>) -> Self {
        Self {
            warehouse: HttpStore::new("warehouse", warehouse),
            fallbacks,
        }
    }

    fn summary(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.warehouse.query_one(&format!(
            "SELECT schools, total_teachers, students FROM program_summary \
             WHERE LOWER(program) = '{}'",
            PROGRAM
        ))?;
        let teachers = f64_col(&row, "total_teachers").ok_or(DashboardError::Malformed {
            store: self.warehouse.name(),
            reason: "missing total_teachers column".to_string(),
        })?;
        Ok(MetricRecord::active()
            .with("schools", f64_col(&row, "schools").unwrap_or(0.0))
            .with("teachers", teachers)
            .with("students", f64_col(&row, "students").unwrap_or(0.0)))
    }
}

impl SourceAdapter for RawalpindiAdapter {
    fn region(&self) -> Region {
        Region::Rawalpindi
    }

    fn measures(&self, metric: Metric) -> bool {
        matches!(
            metric,
            Metric::Observations
                | Metric::LessonPlans
                | Metric::Training
                | Metric::Retention
                | Metric::Summary
        )
    }

    fn fetch_live(
        &self,
        metric: Metric,
        filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError> {
        match metric {
            Metric::Observations => {
                Ok(MetricRecord::launching().with_note("Observation coaching launches Q2 2026"))
            }
            Metric::LessonPlans => engagement_record(
                &self.warehouse,
                "unified_lp_usage",
                "total_events",
                PROGRAM,
                filter.window,
            ),
            Metric::Training => engagement_record(
                &self.warehouse,
                "unified_training_submissions",
                "total_submissions",
                PROGRAM,
                filter.window,
            ),
            Metric::Retention => retention_record(&self.warehouse, PROGRAM),
            Metric::Fico | Metric::StudentLearning => Ok(MetricRecord::no_data()),
            Metric::TalkTime | Metric::Questions => Ok(MetricRecord::not_applicable()
                .with_note("Classroom audio data not collected for RWP")),
            Metric::Summary => self.summary(),
        }
    }

    fn fallbacks(&self) -> &FallbackStore {
        &self.fallbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricStatus;

    fn unreachable_adapter() -> RawalpindiAdapter {
        let config = StoreConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..StoreConfig::default()
        };
        RawalpindiAdapter::new(&config, Arc::new(FallbackStore::builtin()))
    }

    #[test]
    fn observations_report_launching_with_no_values() {
        let adapter = unreachable_adapter();
        let record = adapter
            .fetch_live(Metric::Observations, &MetricFilter::default())
            .unwrap();
        assert_eq!(record.status, MetricStatus::Launching);
        assert!(record.values.is_empty());
        assert!(record.verify().is_ok());
    }

    #[test]
    fn launching_is_distinct_from_no_data() {
        let adapter = unreachable_adapter();
        let obs = adapter
            .fetch_live(Metric::Observations, &MetricFilter::default())
            .unwrap();
        let fico = adapter
            .fetch_live(Metric::Fico, &MetricFilter::default())
            .unwrap();
        assert_ne!(obs.status, fico.status);
    }

    #[test]
    fn unreachable_warehouse_serves_summary_fallback() {
        let adapter = unreachable_adapter();
        let record = adapter.fetch(Metric::Summary, &MetricFilter::default());
        assert_eq!(record.value("schools"), Some(260.0));
        assert_eq!(record.value("teachers"), Some(900.0));
    }
}
