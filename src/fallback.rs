//! Last-known-good metric values served when a live query fails.
//!
//! One declared record per (region, metric), instead of numeric literals
//! scattered through the adapters. The preferred source is the offline
//! refresh job's `latest.json` snapshot; the builtin table carries the most
//! recently verified counts as the floor.

use std::collections::HashMap;
use std::path::Path;

use crate::error::DashboardError;
use crate::snapshot::{Snapshot, SourceSnapshot};
use crate::{Metric, MetricRecord, Region};

/// Note attached to every record served from this store, so a consumer can
/// distinguish a stale fallback from a verified live zero.
pub const FALLBACK_NOTE: &str = "last-known-good fallback";

#[derive(Debug, Default)]
pub struct FallbackStore {
    records: HashMap<(Region, Metric), MetricRecord>,
}

impl FallbackStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: Region, metric: Metric, record: MetricRecord) {
        self.records.insert((region, metric), record);
    }

    /// The declared fallback for one operation, tagged as such. `None` when
    /// no last-known-good value exists (the adapter then reports
    /// `no_data`).
    pub fn record(&self, region: Region, metric: Metric) -> Option<MetricRecord> {
        self.records
            .get(&(region, metric))
            .map(|record| record.clone().with_note(FALLBACK_NOTE))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build from a refresh-job snapshot, keeping only active records from
    /// sources that refreshed cleanly.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut store = Self::empty();
        for (source, result) in &snapshot.sources {
            let Ok(region) = source.parse::<Region>() else {
                continue;
            };
            let SourceSnapshot::Ok { metrics } = result else {
                continue;
            };
            for (name, record) in metrics {
                let Ok(metric) = name.parse::<Metric>() else {
                    continue;
                };
                if record.is_active() && record.verify().is_ok() {
                    store.insert(region, metric, record.clone());
                }
            }
        }
        store
    }

    /// Load `latest.json` written by the refresh job.
    pub fn load(path: &Path) -> Result<Self, DashboardError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Snapshot-backed fallbacks when available, builtin verified counts
    /// otherwise. Snapshot entries win over builtin ones.
    pub fn load_or_builtin(path: &Path) -> Self {
        let mut store = Self::builtin();
        match Self::load(path) {
            Ok(loaded) => {
                tracing::info!(path = %path.display(), entries = loaded.len(), "loaded fallback snapshot");
                store.records.extend(loaded.records);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "no usable fallback snapshot, using builtin values");
            }
        }
        store
    }

    /// Verified counts from the most recent manual audit of each store.
    pub fn builtin() -> Self {
        let mut s = Self::empty();

        // ICT: human TEACH observations against coach capacity.
        s.insert(
            Region::Ict,
            Metric::Observations,
            rec("Human (TEACH)", &[
                ("actual", 2423.0),
                ("ai_count", 0.0),
                ("human_count", 2423.0),
                ("total", 2423.0),
                ("benchmark_monthly", 4840.0),
            ]),
        );
        s.insert(
            Region::Ict,
            Metric::Fico,
            rec("TEACH Tool (Human)", &[
                ("B1", 78.0), ("B2", 72.0), ("B3", 68.0),
                ("B4", 75.0), ("B5", 71.0), ("B6", 65.0),
                ("C1", 70.0), ("C2", 65.0), ("C3", 58.0),
                ("C4", 72.0), ("C5", 68.0), ("C6", 62.0),
                ("D1", 55.0), ("D2", 48.0), ("D3", 42.0),
                ("D4", 68.0), ("D5", 62.0), ("D6", 58.0),
                ("b_avg", 71.5), ("c_avg", 65.8), ("d_avg", 55.5),
            ]),
        );
        s.insert(
            Region::Ict,
            Metric::Summary,
            rec_plain(&[
                ("schools", 52.0),
                ("teachers", 9981.0),
                ("ai_sessions", 0.0),
                ("human_observations", 2423.0),
                ("avg_score", 74.2),
                ("students", 4100.0),
            ]),
        );

        // Balochistan: winter-school AI + human coaching observations.
        s.insert(
            Region::Balochistan,
            Metric::Observations,
            rec("AI + Human", &[
                ("ai_count", 522.0),
                ("human_count", 54.0),
                ("total", 576.0),
                ("actual", 576.0),
            ]),
        );
        s.insert(
            Region::Balochistan,
            Metric::TalkTime,
            rec_plain(&[
                ("student_talk_time", 5.7),
                ("teacher_talk_time", 81.8),
                ("target_student_time", 40.0),
            ]),
        );
        s.insert(
            Region::Balochistan,
            Metric::Questions,
            rec_plain(&[
                ("avg_open_questions", 1.9),
                ("avg_closed_questions", 12.8),
                ("open_question_ratio", 13.0),
            ]),
        );
        s.insert(
            Region::Balochistan,
            Metric::Fico,
            rec("AI (Rumi) + Human", &[
                ("B1", 84.0), ("B2", 80.0), ("B3", 82.0), ("B4", 88.0),
                ("B5", 88.0), ("B6", 42.0), ("B7", 62.0), ("B8", 41.0),
                ("B9", 48.0), ("B10", 84.0), ("B11", 63.0), ("B12", 90.0),
                ("B13", 90.0),
                ("C1", 82.0), ("C2", 78.0), ("C3", 44.0), ("C4", 68.0),
                ("C5", 68.0), ("C6", 85.0), ("C7", 86.0), ("C8", 84.0),
                ("C9", 84.0), ("C10", 90.0), ("C11", 44.0),
                ("D1", 44.0), ("D2", 44.0), ("D3", 6.0), ("D4", 16.0),
                ("D5", 11.0), ("D6", 0.0),
                ("b_avg", 72.5), ("c_avg", 73.9), ("d_avg", 20.2),
            ]),
        );
        s.insert(
            Region::Balochistan,
            Metric::Summary,
            rec_plain(&[
                ("schools", 95.0),
                ("teachers", 34.0),
                ("ai_sessions", 522.0),
                ("human_observations", 54.0),
                ("avg_score", 68.5),
                ("students", 6598.0),
            ]),
        );

        // RWP: platform counts while observation coaching is still rolling
        // out; no observation fallback (that record reports launching).
        s.insert(
            Region::Rawalpindi,
            Metric::Summary,
            rec_plain(&[
                ("schools", 260.0),
                ("teachers", 900.0),
                ("students", 37_000.0),
                ("users", 196.0),
                ("events", 444_656.0),
            ]),
        );

        // Moawin: compliance platform, proxies instead of observations.
        s.insert(
            Region::Moawin,
            Metric::LessonPlans,
            rec("Task Completions", &[("total_events", 2280.0)]),
        );
        s.insert(
            Region::Moawin,
            Metric::Retention,
            rec("School attendance", &[
                ("active_7d", 0.0),
                ("active_30d", 0.0),
                ("total_users", 236.0),
                ("retention_7d", 0.0),
                ("retention_30d", 0.0),
            ]),
        );
        s.insert(
            Region::Moawin,
            Metric::StudentLearning,
            rec("Assessment Scores", &[
                ("avg_score", 67.0),
                ("avg_pass_rate", 70.8),
                ("total_assessments", 9060.0),
            ]),
        );
        s.insert(
            Region::Moawin,
            Metric::Summary,
            rec_plain(&[
                ("schools", 236.0),
                ("teachers", 602.0),
                ("students", 18_758.0),
                ("avg_score", 87.5),
                ("attendance_records", 10_603.0),
            ]),
        );

        // Rumi: WhatsApp AI coaching, verified counts Feb 2026.
        s.insert(
            Region::Rumi,
            Metric::Observations,
            rec("AI Audio Coaching", &[
                ("ai_count", 135.0),
                ("human_count", 0.0),
                ("total", 135.0),
                ("actual", 135.0),
            ]),
        );
        s.insert(
            Region::Rumi,
            Metric::LessonPlans,
            rec("AI-Generated Plans", &[
                ("total_plans", 1815.0),
                ("total_events", 1815.0),
                ("unique_teachers", 0.0),
                ("per_teacher", 0.0),
            ]),
        );
        s.insert(
            Region::Rumi,
            Metric::Retention,
            rec("Chat sessions", &[
                ("active_7d", 0.0),
                ("active_30d", 0.0),
                ("total_users", 1871.0),
                ("retention_7d", 0.0),
                ("retention_30d", 0.0),
            ]),
        );
        s.insert(
            Region::Rumi,
            Metric::StudentLearning,
            rec("WCPM Reading Assessment", &[("total_assessments", 197.0)]),
        );
        s.insert(
            Region::Rumi,
            Metric::Summary,
            rec_plain(&[
                ("teachers", 1871.0),
                ("ai_sessions", 135.0),
                ("chat_sessions", 5044.0),
                ("lesson_plans", 1815.0),
            ]),
        );

        s
    }
}

fn rec_plain(pairs: &[(&str, f64)]) -> MetricRecord {
    let mut record = MetricRecord::active();
    for (field, value) in pairs {
        record = record.with(field, *value);
    }
    record
}

fn rec(kind: &str, pairs: &[(&str, f64)]) -> MetricRecord {
    rec_plain(pairs).with_kind(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_records_all_satisfy_the_invariant() {
        let store = FallbackStore::builtin();
        assert!(!store.is_empty());
        for record in store.records.values() {
            assert!(record.verify().is_ok());
            assert!(record.is_active());
        }
    }

    #[test]
    fn served_record_is_tagged_as_fallback() {
        let store = FallbackStore::builtin();
        let record = store.record(Region::Balochistan, Metric::Observations).unwrap();
        assert_eq!(record.note.as_deref(), Some(FALLBACK_NOTE));
        assert_eq!(record.value("ai_count"), Some(522.0));
        assert_eq!(record.value("total"), Some(576.0));
    }

    #[test]
    fn missing_entry_returns_none() {
        let store = FallbackStore::builtin();
        assert!(store.record(Region::Rawalpindi, Metric::Observations).is_none());
        assert!(FallbackStore::empty().record(Region::Ict, Metric::Observations).is_none());
    }

    #[test]
    fn missing_snapshot_file_falls_back_to_builtin() {
        let store = FallbackStore::load_or_builtin(Path::new("/nonexistent/latest.json"));
        assert_eq!(store.len(), FallbackStore::builtin().len());
    }
}
