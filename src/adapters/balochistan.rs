//! Balochistan adapter: winter-school observation database with AI and
//! human results stored as JSONB, plus the shared warehouse for engagement.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::params::region_params;
use crate::store::{f64_col, ratio, round1, HttpStore, Row};
use crate::{Metric, MetricFilter, MetricRecord, ObservationType, Region};

use super::warehouse::{engagement_record, retention_record};
use super::{pg_window, SourceAdapter};

const PROGRAM: &str = "balochistan";

/// Indicator counts per FICO section in the AI scoring rubric.
const FICO_SECTIONS: [(char, u32); 3] = [('B', 13), ('C', 11), ('D', 6)];

pub struct BalochistanAdapter {
    db: HttpStore,
    warehouse: HttpStore,
    fallbacks: Arc<FallbackStore>,
}

impl BalochistanAdapter {
    pub fn new(
        db: &StoreConfig,
        warehouse: &StoreConfig,
        fallbacks: Arc<FallbackStore>,
    ) -> Self {
        Self {
            db: HttpStore::new("balochistan-db", db),
            warehouse: HttpStore::new("warehouse", warehouse),
            fallbacks,
        }
    }

    fn observations(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let sql = format!(
            "SELECT COUNT(*) FILTER (WHERE ai_results IS NOT NULL) AS ai_count, \
             COUNT(*) FILTER (WHERE human_results IS NOT NULL) AS human_count \
             FROM observations WHERE 1=1 {}",
            pg_window(filter.window, "created_at")
        );
        let row = self.db.query_one(&sql)?;
        let ai = f64_col(&row, "ai_count").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "missing ai_count column".to_string(),
        })?;
        let human = f64_col(&row, "human_count").unwrap_or(0.0);

        let (ai, human) = match filter.observations {
            ObservationType::All => (ai, human),
            ObservationType::AiOnly => (ai, 0.0),
            ObservationType::HumanOnly => (0.0, human),
        };
        Ok(MetricRecord::active()
            .with("ai_count", ai)
            .with("human_count", human)
            .with("total", ai + human)
            .with("actual", ai + human)
            .with_kind("AI + Human"))
    }

    fn talk_time(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let type_filter = match filter.observations {
            ObservationType::All => "",
            ObservationType::AiOnly => "AND human_results IS NULL",
            ObservationType::HumanOnly => "AND human_results IS NOT NULL",
        };
        let sql = format!(
            "SELECT AVG((ai_results->>'teacher_talk_time_percentage')::float) AS teacher_talk, \
             AVG((ai_results->>'student_talk_time_percentage')::float) AS student_talk \
             FROM observations WHERE ai_results IS NOT NULL {} {}",
            type_filter,
            pg_window(filter.window, "created_at")
        );
        let row = self.db.query_one(&sql)?;
        let student = f64_col(&row, "student_talk").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "no talk time values".to_string(),
        })?;
        let teacher = f64_col(&row, "teacher_talk").unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("student_talk_time", round1(student))
            .with("teacher_talk_time", round1(teacher))
            .with("target_student_time", 40.0))
    }

    fn questions(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let sql = format!(
            "SELECT AVG((ai_results->>'open_ended_questions')::float) AS avg_open, \
             AVG((ai_results->>'closed_ended_questions')::float) AS avg_closed \
             FROM observations WHERE ai_results IS NOT NULL \
             AND (ai_results->>'open_ended_questions') IS NOT NULL {}",
            pg_window(filter.window, "created_at")
        );
        let row = self.db.query_one(&sql)?;
        let open = f64_col(&row, "avg_open").ok_or(DashboardError::Malformed {
            store: self.db.name(),
            reason: "no question counts".to_string(),
        })?;
        let closed = f64_col(&row, "avg_closed").unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("avg_open_questions", round1(open))
            .with("avg_closed_questions", round1(closed))
            .with("open_question_ratio", round1(ratio(open, open + closed) * 100.0)))
    }

    fn fico(&self) -> Result<MetricRecord, DashboardError> {
        let mut selects = Vec::new();
        for (letter, count) in FICO_SECTIONS {
            let section = format!("section_{}", letter.to_ascii_lowercase());
            for i in 1..=count {
                selects.push(format!(
                    "AVG(CASE WHEN (ai_results->'scores'->'{}'->>'{}{}')::text = 'YES' \
                     THEN 100 ELSE 0 END) AS {}{}",
                    section, letter, i, letter, i
                ));
            }
        }
        let sql = format!(
            "SELECT {} FROM observations WHERE ai_results IS NOT NULL",
            selects.join(", ")
        );
        let row = self.db.query_one(&sql)?;

        let mut record = MetricRecord::active().with_kind("AI (Rumi) + Human");
        for (letter, count) in FICO_SECTIONS {
            let mut sum = 0.0;
            let mut present = 0u32;
            for i in 1..=count {
                let indicator = format!("{}{}", letter, i);
                if let Some(score) = f64_col(&row, &indicator) {
                    let score = score.round();
                    record = record.with(&indicator, score);
                    sum += score;
                    present += 1;
                }
            }
            if present > 0 {
                let field = format!("{}_avg", letter.to_ascii_lowercase());
                record = record.with(&field, round1(sum / present as f64));
            }
        }
        if record.values.is_empty() {
            return Ok(MetricRecord::no_data());
        }
        Ok(record)
    }

    fn summary(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let obs = self.observations(filter)?;
        let row = self.db.query_one(
            "SELECT COUNT(DISTINCT school_id) AS schools, \
             COUNT(DISTINCT teacher_id) AS teachers, \
             AVG((ai_results->>'overall_score')::float) AS avg_score \
             FROM observations",
        )?;
        Ok(summary_record(&row, &obs))
    }
}

/// The observation store has no student table; `students` comes from the
/// static program roster.
fn summary_record(row: &Row, obs: &MetricRecord) -> MetricRecord {
    let students = region_params(Region::Balochistan)
        .students
        .map(|s| s as f64)
        .unwrap_or(0.0);
    MetricRecord::active()
        .with("schools", f64_col(row, "schools").unwrap_or(0.0))
        .with("teachers", f64_col(row, "teachers").unwrap_or(0.0))
        .with("students", students)
        .with("ai_sessions", obs.value("ai_count").unwrap_or(0.0))
        .with("human_observations", obs.value("human_count").unwrap_or(0.0))
        .with("avg_score", round1(f64_col(row, "avg_score").unwrap_or(0.0)))
}

impl SourceAdapter for BalochistanAdapter {
    fn region(&self) -> Region {
        Region::Balochistan
    }

    fn measures(&self, metric: Metric) -> bool {
        !matches!(metric, Metric::StudentLearning)
    }

    fn fetch_live(
        &self,
        metric: Metric,
        filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError> {
        match metric {
            Metric::Observations => self.observations(filter),
            Metric::TalkTime => self.talk_time(filter),
            Metric::Questions => self.questions(filter),
            Metric::Fico => self.fico(),
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
            Metric::StudentLearning => {
                Ok(MetricRecord::no_data().with_note("No direct student assessment data"))
            }
            Metric::Summary => self.summary(filter),
        }
    }

    fn fallbacks(&self) -> &FallbackStore {
        &self.fallbacks
    }
}
