//! # obsdash
//!
//! Cross-region metric aggregation core for the teaching-quality
//! observability dashboard. Five regional source adapters normalize
//! heterogeneous upstream stores into a common metric shape; a router
//! dispatches filter sets to adapters (including a Combined aggregate) and
//! a TTL cache memoizes every retrieval behind a freshness indicator.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod params;
pub mod router;
pub mod snapshot;
pub mod store;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cache::{CacheKey, MetricCache};
use config::DashboardConfig;
use error::DashboardError;
use fallback::FallbackStore;
use router::MetricRouter;

/// Lifecycle tag carried by every metric record. Distinguishes "zero because
/// the instrument does not apply here" from "zero because nothing was
/// measured yet" from "deployment pending".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Active,
    NoData,
    NotApplicable,
    Launching,
}

impl std::fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricStatus::Active => write!(f, "active"),
            MetricStatus::NoData => write!(f, "no_data"),
            MetricStatus::NotApplicable => write!(f, "not_applicable"),
            MetricStatus::Launching => write!(f, "launching"),
        }
    }
}

/// Normalized metric value bundle returned by every source adapter.
///
/// `values` holds only the non-null numeric fields; an absent key is the
/// normalized form of an upstream NULL. `kind` labels the measurement
/// instrument when regions measure the same nominal metric differently
/// (e.g. "AI + Human" vs "TEACH Tool (Human)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub status: MetricStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, f64>,
}

impl MetricRecord {
    fn with_status(status: MetricStatus) -> Self {
        Self {
            status,
            kind: None,
            note: None,
            values: BTreeMap::new(),
        }
    }

    pub fn active() -> Self {
        Self::with_status(MetricStatus::Active)
    }

    pub fn no_data() -> Self {
        Self::with_status(MetricStatus::NoData)
    }

    pub fn not_applicable() -> Self {
        Self::with_status(MetricStatus::NotApplicable)
    }

    pub fn launching() -> Self {
        Self::with_status(MetricStatus::Launching)
    }

    /// Explicit "no region reported data" record returned by the router
    /// when every adapter for a metric is non-active.
    pub fn unavailable() -> Self {
        Self::no_data().with_note("No data available")
    }

    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), value);
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn is_active(&self) -> bool {
        self.status == MetricStatus::Active
    }

    /// The one structural correctness constraint in the system: `active`
    /// requires at least one value field, any other status requires none.
    pub fn verify(&self) -> Result<(), DashboardError> {
        match self.status {
            MetricStatus::Active if self.values.is_empty() => Err(DashboardError::Invariant(
                "active record carries no value fields".to_string(),
            )),
            MetricStatus::Active => Ok(()),
            _ if !self.values.is_empty() => Err(DashboardError::Invariant(format!(
                "{} record carries value fields {:?}",
                self.status,
                self.values.keys().collect::<Vec<_>>()
            ))),
            _ => Ok(()),
        }
    }
}

/// Metric-retrieval operations exposed by the source adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Observations,
    LessonPlans,
    Training,
    Retention,
    Fico,
    StudentLearning,
    TalkTime,
    Questions,
    Summary,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Observations,
        Metric::LessonPlans,
        Metric::Training,
        Metric::Retention,
        Metric::Fico,
        Metric::StudentLearning,
        Metric::TalkTime,
        Metric::Questions,
        Metric::Summary,
    ];

    /// The six cross-region comparison metrics rendered side by side.
    pub const COMPARISON: [Metric; 6] = [
        Metric::Observations,
        Metric::LessonPlans,
        Metric::Training,
        Metric::Retention,
        Metric::Fico,
        Metric::StudentLearning,
    ];
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Metric::Observations => "observations",
            Metric::LessonPlans => "lesson_plans",
            Metric::Training => "training",
            Metric::Retention => "retention",
            Metric::Fico => "fico",
            Metric::StudentLearning => "student_learning",
            Metric::TalkTime => "talk_time",
            Metric::Questions => "questions",
            Metric::Summary => "summary",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Metric {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observations" => Ok(Metric::Observations),
            "lesson_plans" => Ok(Metric::LessonPlans),
            "training" => Ok(Metric::Training),
            "retention" => Ok(Metric::Retention),
            "fico" => Ok(Metric::Fico),
            "student_learning" => Ok(Metric::StudentLearning),
            "talk_time" => Ok(Metric::TalkTime),
            "questions" => Ok(Metric::Questions),
            "summary" => Ok(Metric::Summary),
            other => Err(DashboardError::UnknownMetric(other.to_string())),
        }
    }
}

/// The five regional programs backed by independent upstream stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Ict,
    Balochistan,
    Rawalpindi,
    Moawin,
    Rumi,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Ict,
        Region::Balochistan,
        Region::Rawalpindi,
        Region::Moawin,
        Region::Rumi,
    ];
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::Ict => "ICT",
            Region::Balochistan => "Balochistan",
            Region::Rawalpindi => "RWP",
            Region::Moawin => "Moawin",
            Region::Rumi => "Rumi",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Region {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ict" | "islamabad" => Ok(Region::Ict),
            "balochistan" => Ok(Region::Balochistan),
            "rwp" | "rawalpindi" => Ok(Region::Rawalpindi),
            "moawin" => Ok(Region::Moawin),
            "rumi" => Ok(Region::Rumi),
            other => Err(DashboardError::UnknownRegion(other.to_string())),
        }
    }
}

/// Region selection: one named region, or the cross-region aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionSelector {
    Combined,
    Region(Region),
}

impl std::fmt::Display for RegionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionSelector::Combined => write!(f, "Combined"),
            RegionSelector::Region(region) => write!(f, "{}", region),
        }
    }
}

impl FromStr for RegionSelector {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("combined") {
            Ok(RegionSelector::Combined)
        } else {
            Region::from_str(s).map(RegionSelector::Region)
        }
    }
}

/// Time-window sub-filter applied by the adapters' query clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    #[default]
    AllTime,
    Last7Days,
    Last30Days,
    Last90Days,
    ThisYear,
}

/// Observation-type sub-filter (AI vs human instruments).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    #[default]
    All,
    AiOnly,
    HumanOnly,
}

/// Sub-filters passed through the router to the adapters unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricFilter {
    pub window: TimeWindow,
    pub observations: ObservationType,
}

/// Dashboard facade: the presentation layer's only entry point. Every read
/// goes through the TTL cache into the router; no caller talks to an
/// adapter or an upstream store directly.
pub struct Dashboard {
    router: MetricRouter,
    cache: MetricCache,
}

impl Dashboard {
    pub fn new(router: MetricRouter, cache: MetricCache) -> Self {
        Self { router, cache }
    }

    /// Build the five adapters from store configuration, with the refresh
    /// job's latest snapshot layered over builtin fallbacks and the default
    /// 8-hour cache.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let fallbacks = Arc::new(FallbackStore::load_or_builtin(
            &config.cache_dir.join("latest.json"),
        ));
        Self {
            router: MetricRouter::from_config(config, fallbacks),
            cache: MetricCache::with_default_ttl(),
        }
    }

    /// Cache-checked metric read. Never fails: upstream failures resolve to
    /// fallback or placeholder records inside the adapters and router.
    pub fn metrics(
        &self,
        selector: RegionSelector,
        metric: Metric,
        filter: &MetricFilter,
    ) -> MetricRecord {
        let key = CacheKey {
            selector,
            metric,
            filter: filter.clone(),
        };
        self.cache
            .get_or_compute(key, || self.router.dispatch(selector, metric, filter))
    }

    /// All six comparison metrics for one selector, keyed by metric name.
    pub fn overview(
        &self,
        selector: RegionSelector,
        filter: &MetricFilter,
    ) -> BTreeMap<String, MetricRecord> {
        Metric::COMPARISON
            .iter()
            .map(|metric| (metric.to_string(), self.metrics(selector, *metric, filter)))
            .collect()
    }

    /// Manual refresh trigger: drops every memoized entry atomically and
    /// stamps the freshness timestamp.
    pub fn refresh(&self) {
        self.cache.invalidate_all();
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.cache.last_refresh()
    }

    /// Human-readable "data refreshed" label. Never fails, even before the
    /// first refresh.
    pub fn freshness(&self) -> String {
        self.cache.freshness_label()
    }

    pub fn router(&self) -> &MetricRouter {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedAdapter;
    use crate::cache::testing::ManualClock;
    use crate::cache::DEFAULT_TTL;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn dashboard_with_one_adapter(
        record: Option<MetricRecord>,
        clock: Arc<ManualClock>,
    ) -> (Dashboard, Arc<std::sync::atomic::AtomicUsize>) {
        let adapter = ScriptedAdapter::new(Region::Balochistan, record);
        let calls = adapter.calls();
        let mut router = MetricRouter::new();
        router.register(Box::new(adapter));
        let cache = MetricCache::new(DEFAULT_TTL, clock);
        (Dashboard::new(router, cache), calls)
    }

    #[test]
    fn active_record_requires_values() {
        assert!(MetricRecord::active().verify().is_err());
        assert!(MetricRecord::active().with("actual", 1.0).verify().is_ok());
    }

    #[test]
    fn non_active_record_requires_no_values() {
        assert!(MetricRecord::no_data().verify().is_ok());
        assert!(MetricRecord::not_applicable().verify().is_ok());
        assert!(MetricRecord::launching().verify().is_ok());
        assert!(MetricRecord::no_data().with("actual", 0.0).verify().is_err());
    }

    #[test]
    fn unknown_region_is_a_hard_error() {
        assert!(matches!(
            "Kashmir".parse::<Region>(),
            Err(DashboardError::UnknownRegion(_))
        ));
        assert!(matches!(
            "latency".parse::<Metric>(),
            Err(DashboardError::UnknownMetric(_))
        ));
    }

    #[test]
    fn region_round_trip() {
        for region in Region::ALL {
            let parsed: Region = region.to_string().parse().unwrap();
            assert_eq!(parsed, region);
        }
        assert_eq!("combined".parse::<RegionSelector>().unwrap(), RegionSelector::Combined);
    }

    #[test]
    fn repeated_read_within_ttl_hits_upstream_once() {
        let clock = Arc::new(ManualClock::new());
        let record = MetricRecord::active().with("total", 576.0);
        let (dash, calls) = dashboard_with_one_adapter(Some(record), clock);

        let filter = MetricFilter::default();
        let selector = RegionSelector::Region(Region::Balochistan);
        let first = dash.metrics(selector, Metric::Observations, &filter);
        let second = dash.metrics(selector, Metric::Observations, &filter);

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_after_ttl_expiry_hits_upstream_again() {
        let clock = Arc::new(ManualClock::new());
        let record = MetricRecord::active().with("total", 576.0);
        let (dash, calls) = dashboard_with_one_adapter(Some(record), clock.clone());

        let filter = MetricFilter::default();
        let selector = RegionSelector::Region(Region::Balochistan);
        dash.metrics(selector, Metric::Observations, &filter);
        clock.advance(DEFAULT_TTL + Duration::from_secs(1));
        dash.metrics(selector, Metric::Observations, &filter);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn manual_refresh_forces_upstream_call_and_stamps_freshness() {
        let clock = Arc::new(ManualClock::new());
        let record = MetricRecord::active().with("total", 576.0);
        let (dash, calls) = dashboard_with_one_adapter(Some(record), clock.clone());

        let filter = MetricFilter::default();
        let selector = RegionSelector::Region(Region::Balochistan);
        dash.metrics(selector, Metric::Observations, &filter);
        dash.refresh();

        let delta = clock.now_utc() - dash.last_refresh();
        assert!(delta.num_seconds().abs() < 1);

        dash.metrics(selector, Metric::Observations, &filter);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unreachable_upstream_with_no_fallback_reports_no_data() {
        let clock = Arc::new(ManualClock::new());
        let (dash, _calls) = dashboard_with_one_adapter(None, clock);

        let record = dash.metrics(
            RegionSelector::Region(Region::Balochistan),
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(record.status, MetricStatus::NoData);
        assert!(record.values.is_empty());
        assert!(record.verify().is_ok());
    }

    #[test]
    fn freshness_label_never_fails_before_first_refresh() {
        let clock = Arc::new(ManualClock::new());
        let (dash, _) = dashboard_with_one_adapter(None, clock);
        let label = dash.freshness();
        assert!(!label.is_empty());
    }

    #[test]
    fn from_config_serves_snapshot_fallbacks_over_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "observations".to_string(),
            MetricRecord::active()
                .with("total", 700.0)
                .with_kind("AI + Human"),
        );
        let written = snapshot::Snapshot {
            timestamp: Utc::now(),
            sources: [(
                "Balochistan".to_string(),
                snapshot::SourceSnapshot::Ok { metrics },
            )]
            .into_iter()
            .collect(),
        };
        snapshot::write_snapshot(&written, dir.path()).unwrap();

        let unreachable = config::StoreConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..config::StoreConfig::default()
        };
        let config = DashboardConfig {
            warehouse: unreachable.clone(),
            balochistan: unreachable.clone(),
            moawin: unreachable.clone(),
            rumi: unreachable,
            cache_dir: dir.path().to_path_buf(),
        };
        let dash = Dashboard::from_config(&config);

        // The snapshot value wins over the builtin 576.
        let record = dash.metrics(
            RegionSelector::Region(Region::Balochistan),
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(record.value("total"), Some(700.0));
        assert_eq!(record.note.as_deref(), Some(fallback::FALLBACK_NOTE));

        // Entries the snapshot does not carry keep their builtin floor.
        let ict = dash.metrics(
            RegionSelector::Region(Region::Ict),
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(ict.value("actual"), Some(2423.0));
    }

    #[test]
    fn record_serialization_round_trip() {
        let record = MetricRecord::active()
            .with("actual", 2423.0)
            .with("benchmark_monthly", 4840.0)
            .with_kind("Human (TEACH)");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"active\""));
        let back: MetricRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn non_active_status_serializes_without_values() {
        let json = serde_json::to_string(&MetricRecord::not_applicable()).unwrap();
        assert!(!json.contains("values"));
        assert!(json.contains("not_applicable"));
    }
}
