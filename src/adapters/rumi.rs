//! Rumi adapter: WhatsApp-based AI coaching platform. Observations are
//! audio coaching sessions (AI only); engagement comes from generated
//! lesson plans and chat sessions.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::params::region_params;
use crate::store::{f64_col, ratio, round1, HttpStore};
use crate::{Metric, MetricFilter, MetricRecord, ObservationType, Region};

use super::{pg_window, SourceAdapter};

pub struct RumiAdapter {
    db: HttpStore,
    fallbacks: Arc<FallbackStore>,
}

impl RumiAdapter {
    pub fn new(db: &StoreConfig, fallbacks: Arc<FallbackStore>) -> Self {
        Self {
            db: HttpStore::new("rumi-db", db),
            fallbacks,
        }
    }

    fn observations(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        // Coaching sessions are the AI observation analogue; there is no
        // human coaching channel on this platform.
        if filter.observations == ObservationType::HumanOnly {
            return Ok(MetricRecord::active()
                .with("ai_count", 0.0)
                .with("human_count", 0.0)
                .with("total", 0.0)
                .with("actual", 0.0)
                .with_kind("AI Audio Coaching"));
        }
        let sql = format!(
            "SELECT COUNT(*) FILTER (WHERE status = 'completed') AS completed \
             FROM coaching_sessions WHERE 1=1 {}",
            pg_window(filter.window, "created_at")
        );
        let row = self.db.query_one(&sql)?;
        let completed = f64_col(&row, "completed").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing completed column".to_string(),
        })?;
        Ok(MetricRecord::active()
            .with("ai_count", completed)
            .with("human_count", 0.0)
            .with("total", completed)
            .with("actual", completed)
            .with_kind("AI Audio Coaching"))
    }

    fn lesson_plans(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let sql = format!(
            "SELECT COUNT(*) AS total, COUNT(DISTINCT user_id) AS unique_teachers \
             FROM lesson_plans WHERE 1=1 {}",
            pg_window(filter.window, "created_at")
        );
        let row = self.db.query_one(&sql)?;
        let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing total column".to_string(),
        })?;
        if total == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        let teachers = f64_col(&row, "unique_teachers").unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("total_plans", total)
            .with("total_events", total)
            .with("unique_teachers", teachers)
            .with("per_teacher", round1(ratio(total, teachers)))
            .with_kind("AI-Generated Plans"))
    }

    /// Chat-session activity over the registered teacher base.
    fn retention(&self) -> Result<MetricRecord, DashboardError> {
        let row = self.db.query_one(
            "SELECT \
             COUNT(DISTINCT CASE WHEN started_at > NOW() - INTERVAL '7 days' \
               THEN user_id END) AS active_7d, \
             COUNT(DISTINCT CASE WHEN started_at > NOW() - INTERVAL '30 days' \
               THEN user_id END) AS active_30d \
             FROM chat_sessions",
        )?;
        let active_7d = f64_col(&row, "active_7d").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing active_7d column".to_string(),
        })?;
        let active_30d = f64_col(&row, "active_30d").unwrap_or(0.0);
        let total = region_params(Region::Rumi)
            .teachers
            .map(|t| t as f64)
            .unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("active_7d", active_7d)
            .with("active_30d", active_30d)
            .with("total_users", total)
            .with("retention_7d", round1(ratio(active_7d, total) * 100.0))
            .with("retention_30d", round1(ratio(active_30d, total) * 100.0))
            .with_kind("Chat sessions"))
    }

    fn student_learning(&self) -> Result<MetricRecord, DashboardError> {
        let row = self
            .db
            .query_one("SELECT COUNT(*) AS total FROM reading_assessments")?;
        let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing total column".to_string(),
        })?;
        if total == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        Ok(MetricRecord::active()
            .with("total_assessments", total)
            .with_kind("WCPM Reading Assessment"))
    }

    fn summary(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let sql = format!(
            "SELECT \
             (SELECT COUNT(*) FROM users WHERE registration_completed = true {w}) AS teachers, \
             (SELECT COUNT(*) FROM coaching_sessions WHERE status = 'completed' {w}) AS ai_sessions, \
             (SELECT COUNT(*) FROM chat_sessions WHERE 1=1 {w2}) AS chat_sessions, \
             (SELECT COUNT(*) FROM lesson_plans WHERE 1=1 {w}) AS lesson_plans",
            w = pg_window(filter.window, "created_at"),
            w2 = pg_window(filter.window, "started_at"),
        );
        let row = self.db.query_one(&sql)?;
        let teachers = f64_col(&row, "teachers").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing teachers column".to_string(),
        })?;
        Ok(MetricRecord::active()
            .with("teachers", teachers)
            .with("ai_sessions", f64_col(&row, "ai_sessions").unwrap_or(0.0))
            .with("chat_sessions", f64_col(&row, "chat_sessions").unwrap_or(0.0))
            .with("lesson_plans", f64_col(&row, "lesson_plans").unwrap_or(0.0)))
    }
}

impl SourceAdapter for RumiAdapter {
    fn region(&self) -> Region {
        Region::Rumi
    }

    fn measures(&self, metric: Metric) -> bool {
        matches!(
            metric,
            Metric::Observations
                | Metric::LessonPlans
                | Metric::Retention
                | Metric::StudentLearning
                | Metric::Summary
        )
    }

    fn fetch_live(
        &self,
        metric: Metric,
        filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError> {
        match metric {
            Metric::Observations => self.observations(filter),
            Metric::LessonPlans => self.lesson_plans(filter),
            Metric::Retention => self.retention(),
            Metric::StudentLearning => self.student_learning(),
            Metric::Summary => self.summary(filter),
            Metric::Training => Ok(MetricRecord::not_applicable()
                .with_note("Coaching-only platform, no training modules")),
            Metric::Fico | Metric::TalkTime | Metric::Questions => {
                Ok(MetricRecord::not_applicable()
                    .with_note("Chat-based coaching, no classroom observation scoring"))
            }
        }
    }

    fn fallbacks(&self) -> &FallbackStore {
        &self.fallbacks
    }
}
