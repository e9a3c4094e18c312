//! Moawin adapter: school compliance platform. No classroom observation
//! instrument exists here; engagement and learning metrics come from task
//! completions, training progress, attendance and assessment scores.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::store::{f64_col, ratio, round1, HttpStore};
use crate::{Metric, MetricFilter, MetricRecord, Region};

use super::SourceAdapter;

pub struct MoawinAdapter {
    db: HttpStore,
    fallbacks: Arc<FallbackStore>,
}

impl MoawinAdapter {
    pub fn new(db: &StoreConfig, fallbacks: Arc<FallbackStore>) -> Self {
        Self {
            db: HttpStore::new("moawin-db", db),
            fallbacks,
        }
    }

    /// Task completions stand in for lesson-plan engagement on this
    /// platform.
    fn lesson_plans(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE status = 'completed') AS completed \
             FROM task_completions",
        )?;
        let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing total column".to_string(),
        })?;
        if total == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        let completed = f64_col(&row, "completed").unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("total_events", total)
            .with("completed", completed)
            .with("completion_rate", round1(ratio(completed, total) * 100.0))
            .with_kind("Task Completions"))
    }

    fn training(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT COUNT(DISTINCT teacher_id) AS teachers_started, \
             COUNT(DISTINCT teacher_id) FILTER (WHERE status = 'completed') AS teachers_completed, \
             AVG(progress_percentage) AS avg_progress \
             FROM teacher_training_progress",
        )?;
        let started = f64_col(&row, "teachers_started").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing teachers_started column".to_string(),
        })?;
        if started == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        Ok(MetricRecord::active()
            .with("teachers_started", started)
            .with("teachers_completed", f64_col(&row, "teachers_completed").unwrap_or(0.0))
            .with("avg_progress", round1(f64_col(&row, "avg_progress").unwrap_or(0.0))))
    }

    /// School-level attendance as the retention proxy: a school is "active"
    /// when it filed attendance in the window.
    fn retention(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT \
             COUNT(DISTINCT CASE WHEN date >= CURRENT_DATE - INTERVAL '7 days' \
               THEN school_id END) AS active_7d, \
             COUNT(DISTINCT CASE WHEN date >= CURRENT_DATE - INTERVAL '30 days' \
               THEN school_id END) AS active_30d, \
             COUNT(DISTINCT school_id) AS total_schools \
             FROM attendance WHERE total_students > 0",
        )?;
        let total = f64_col(&row, "total_schools").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing total_schools column".to_string(),
        })?;
        if total == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        let active_7d = f64_col(&row, "active_7d").unwrap_or(0.0);
        let active_30d = f64_col(&row, "active_30d").unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("active_7d", active_7d)
            .with("active_30d", active_30d)
            .with("total_users", total)
            .with("retention_7d", round1(ratio(active_7d, total) * 100.0))
            .with("retention_30d", round1(ratio(active_30d, total) * 100.0))
            .with_kind("School attendance"))
    }

    fn student_learning(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT ROUND(AVG(percentage)::numeric, 1) AS avg_score, \
             ROUND(COUNT(*) FILTER (WHERE is_passed = true)::float / \
               NULLIF(COUNT(*), 0) * 100, 1) AS pass_rate, \
             COUNT(*) AS total \
             FROM student_scores",
        )?;
        let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing total column".to_string(),
        })?;
        if total == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        Ok(MetricRecord::active()
            .with("avg_score", f64_col(&row, "avg_score").unwrap_or(0.0))
            .with("avg_pass_rate", f64_col(&row, "pass_rate").unwrap_or(0.0))
            .with("total_assessments", total)
            .with_kind("Assessment Scores"))
    }

    fn summary(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT \
             (SELECT COUNT(*) FROM schools) AS schools, \
             (SELECT COUNT(*) FROM teachers) AS teachers, \
             (SELECT COUNT(*) FROM pefsis_students) AS students, \
             (SELECT ROUND(AVG(CASE WHEN total_students > 0 \
                THEN total_present::float / total_students * 100 ELSE 0 END), 1) \
              FROM attendance WHERE total_students > 0) AS avg_attendance",
        )?;
        let schools = f64_col(&row, "schools").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing schools column".to_string(),
        })?;
        Ok(MetricRecord::active()
            .with("schools", schools)
            .with("teachers", f64_col(&row, "teachers").unwrap_or(0.0))
            .with("students", f64_col(&row, "students").unwrap_or(0.0))
            .with("avg_score", f64_col(&row, "avg_attendance").unwrap_or(0.0)))
    }
}

impl SourceAdapter for MoawinAdapter {
    fn region(&self) -> Region {
        Region::Moawin
    }

    fn measures(&self, metric: Metric) -> bool {
        matches!(
            metric,
            Metric::LessonPlans
                | Metric::Training
                | Metric::Retention
                | Metric::StudentLearning
                | Metric::Summary
        )
    }

    fn fetch_live(
        &self,
        metric: Metric,
        _filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError> {
        match metric {
            Metric::LessonPlans => self.lesson_plans(),
            Metric::Training => self.training(),
            Metric::Retention => self.retention(),
            Metric::StudentLearning => self.student_learning(),
            Metric::Summary => self.summary(),
            Metric::Observations | Metric::TalkTime | Metric::Questions | Metric::Fico => {
                Ok(MetricRecord::not_applicable()
                    .with_note("Compliance platform, no classroom observation instrument"))
            }
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

    fn unreachable_adapter(fallbacks: FallbackStore) -> MoawinAdapter {
        let config = StoreConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..StoreConfig::default()
        };
        MoawinAdapter::new(&config, Arc::new(fallbacks))
    }

    #[test]
    fn observations_are_not_applicable_never_zero() {
        let adapter = unreachable_adapter(FallbackStore::empty());
        let record = adapter
            .fetch_live(Metric::Observations, &MetricFilter::default())
            .unwrap();
        assert_eq!(record.status, MetricStatus::NotApplicable);
        assert_eq!(record.value("total"), None);
    }

    #[test]
    fn unreachable_db_serves_task_completion_fallback() {
        let adapter = unreachable_adapter(FallbackStore::builtin());
        let record = adapter.fetch(Metric::LessonPlans, &MetricFilter::default());
        assert_eq!(record.value("total_events"), Some(2280.0));
        assert_eq!(record.kind.as_deref(), Some("Task Completions"));
    }

    #[test]
    fn every_metric_survives_upstream_failure() {
        let adapter = unreachable_adapter(FallbackStore::empty());
        for metric in Metric::ALL {
            let record = adapter.fetch(metric, &MetricFilter::default());
            assert!(record.verify().is_ok(), "invariant broken for {}", metric);
        }
    }
}
