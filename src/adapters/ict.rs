//! ICT adapter: human TEACH-tool observations from the warehouse prod
//! mirror, engagement from the unified views.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DashboardError;
use crate::fallback::FallbackStore;
use crate::params::observation_benchmark;
use crate::store::{f64_col, round1, HttpStore};
use crate::{Metric, MetricFilter, MetricRecord, ObservationType, Region};

use super::warehouse::{engagement_record, retention_record};
use super::{warehouse_window, SourceAdapter};

const PROGRAM: &str = "ict";

/// FICO section indicators mapped from the TEACH observation columns.
/// Section B: time on learning + lesson facilitation. Section C: checks for
/// understanding + feedback. Section D: critical thinking + socio-emotional.
const FICO_COLUMNS: [(&str, &str); 18] = [
    ("B1", "time_on_learning_1"),
    ("B2", "time_on_learning_2"),
    ("B3", "time_on_learning_3"),
    ("B4", "lesson_facilitation_1"),
    ("B5", "lesson_facilitation_2"),
    ("B6", "lesson_facilitation_3"),
    ("C1", "checks_understanding_1"),
    ("C2", "checks_understanding_2"),
    ("C3", "checks_understanding_3"),
    ("C4", "feedback_1"),
    ("C5", "feedback_2"),
    ("C6", "feedback_3"),
    ("D1", "critical_thinking_1"),
    ("D2", "critical_thinking_2"),
    ("D3", "critical_thinking_3"),
    ("D4", "socio_emotional_1"),
    ("D5", "socio_emotional_2"),
    ("D6", "socio_emotional_3"),
];

pub struct IctAdapter {
    warehouse: HttpStore,
    fallbacks: Arc<FallbackStore>,
}

impl IctAdapter {
    pub fn new(warehouse: &StoreConfig, fallbacks: Arc<FallbackStore>) -> Self {
        Self {
            warehouse: HttpStore::new("warehouse", warehouse),
            fallbacks,
        }
    }

    fn observations(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        // The TEACH mirror carries human observations only.
        if filter.observations == ObservationType::AiOnly {
            return Ok(MetricRecord::active()
                .with("ai_count", 0.0)
                .with("human_count", 0.0)
                .with("total", 0.0)
                .with("actual", 0.0)
                .with_kind("Human (TEACH)"));
        }
        let sql = format!(
            "SELECT COUNT(*) AS total FROM teach_observations WHERE 1=1 {}",
            warehouse_window(filter.window, "observation_date")
        );
        let row = self.warehouse.query_one(&sql)?;
        let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
            store: self.warehouse.name(),
            reason: "missing total column".to_string(),
        })?;
        let benchmark = observation_benchmark(Region::Ict)
            .map(|bm| bm.monthly() as f64)
            .unwrap_or(0.0);
        Ok(MetricRecord::active()
            .with("actual", total)
            .with("ai_count", 0.0)
            .with("human_count", total)
            .with("total", total)
            .with("benchmark_monthly", benchmark)
            .with_kind("Human (TEACH)"))
    }

    fn fico(&self) -> Result<MetricRecord, DashboardError> {
        let selects: Vec<String> = FICO_COLUMNS
            .iter()
            .map(|(indicator, column)| {
                format!("AVG(CAST({} AS FLOAT64)) * 100 AS {}", column, indicator)
            })
            .collect();
        let sql = format!(
            "SELECT {} FROM teach_observations",
            selects.join(", ")
        );
        let row = self.warehouse.query_one(&sql)?;

        let mut record = MetricRecord::active().with_kind("TEACH Tool (Human)");
        let mut sections: [(char, f64, u32); 3] = [('B', 0.0, 0), ('C', 0.0, 0), ('D', 0.0, 0)];
        for (indicator, _) in FICO_COLUMNS {
            let Some(score) = f64_col(&row, indicator) else {
                continue;
            };
            let score = score.round();
            record = record.with(indicator, score);
            for section in sections.iter_mut() {
                if indicator.starts_with(section.0) {
                    section.1 += score;
                    section.2 += 1;
                }
            }
        }
        if record.values.is_empty() {
            return Ok(MetricRecord::no_data());
        }
        for (letter, sum, n) in sections {
            if n > 0 {
                let field = format!("{}_avg", letter.to_ascii_lowercase());
                record = record.with(&field, round1(sum / n as f64));
            }
        }
        Ok(record)
    }

    fn student_learning(&self) -> MetricRecord {
        // Teacher-certification RCT result; not re-queried from any store.
        MetricRecord::active()
            .with("effect_size", 0.46)
            .with_kind("RCT Effect Size")
            .with_note("0.46 SD improvement (Cohen's d) from teacher certification")
    }

    fn summary(&self, filter: &MetricFilter) -> Result<MetricRecord, DashboardError> {
        let sql = format!(
            "SELECT COUNT(DISTINCT school_id) AS schools, COUNT(*) AS observations, \
             AVG(overall_score) AS avg_score FROM teach_observations WHERE 1=1 {}",
            warehouse_window(filter.window, "observation_date")
        );
        let row = self.warehouse.query_one(&sql)?;
        let observations = f64_col(&row, "observations").unwrap_or(0.0);
        if observations == 0.0 {
            return Ok(MetricRecord::no_data());
        }
        let teachers_row = self
            .warehouse
            .query_one("SELECT COUNT(*) AS count FROM teacher_profiles")?;
        Ok(MetricRecord::active()
            .with("schools", f64_col(&row, "schools").unwrap_or(0.0))
            .with("teachers", f64_col(&teachers_row, "count").unwrap_or(0.0))
            .with("ai_sessions", 0.0)
            .with("human_observations", observations)
            .with("avg_score", round1(f64_col(&row, "avg_score").unwrap_or(0.0))))
    }
}

impl SourceAdapter for IctAdapter {
    fn region(&self) -> Region {
        Region::Ict
    }

    fn measures(&self, metric: Metric) -> bool {
        !matches!(metric, Metric::TalkTime | Metric::Questions)
    }

    fn fetch_live(
        &self,
        metric: Metric,
        filter: &MetricFilter,
    ) -> Result<MetricRecord, DashboardError> {
        match metric {
            Metric::Observations => self.observations(filter),
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
            Metric::Fico => self.fico(),
            Metric::StudentLearning => Ok(self.student_learning()),
            Metric::Summary => self.summary(filter),
            Metric::TalkTime => Ok(MetricRecord::not_applicable()
                .with_note("Talk time data not available in TEACH observations")),
            Metric::Questions => Ok(MetricRecord::not_applicable()
                .with_note("Question data not available in TEACH observations")),
        }
    }

    fn fallbacks(&self) -> &FallbackStore {
        &self.fallbacks
    }
}
