//! Metric router: maps a filter set to the right source adapter call, and
//! aggregates across all adapters for the Combined view.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::adapters::{
    BalochistanAdapter, IctAdapter, MoawinAdapter, RawalpindiAdapter, RumiAdapter, SourceAdapter,
};
use crate::config::DashboardConfig;
use crate::fallback::FallbackStore;
use crate::store::{ratio, round1};
use crate::{Metric, MetricFilter, MetricRecord, Region, RegionSelector};

/// How a value field combines across regions in Combined mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Counts add up.
    Sum,
    /// Rates and averages take the arithmetic mean over the regions that
    /// report the field.
    Mean,
}

/// Field-level merge rule. Explicit names first, then shape heuristics
/// (FICO indicators like `B7`, `avg_*`, `*_rate`, `*_avg`).
pub fn merge_rule(field: &str) -> MergeRule {
    match field {
        "per_teacher" | "effect_size" | "retention_7d" | "retention_30d"
        | "student_talk_time" | "teacher_talk_time" | "target_student_time"
        | "open_question_ratio" | "completion_rate" | "avg_attendance" => MergeRule::Mean,
        _ => {
            let fico_indicator = field.len() <= 3
                && field.starts_with(['B', 'C', 'D'])
                && field[1..].chars().all(|c| c.is_ascii_digit());
            if fico_indicator
                || field.starts_with("avg_")
                || field.ends_with("_avg")
                || field.ends_with("_rate")
                || field.ends_with("_pct")
            {
                MergeRule::Mean
            } else {
                MergeRule::Sum
            }
        }
    }
}

pub struct MetricRouter {
    adapters: HashMap<Region, Box<dyn SourceAdapter>>,
}

impl Default for MetricRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRouter {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.insert(adapter.region(), adapter);
    }

    /// Registry of all five regional adapters.
    pub fn from_config(config: &DashboardConfig, fallbacks: Arc<FallbackStore>) -> Self {
        let mut router = Self::new();
        router.register(Box::new(IctAdapter::new(&config.warehouse, fallbacks.clone())));
        router.register(Box::new(BalochistanAdapter::new(
            &config.balochistan,
            &config.warehouse,
            fallbacks.clone(),
        )));
        router.register(Box::new(RawalpindiAdapter::new(
            &config.warehouse,
            fallbacks.clone(),
        )));
        router.register(Box::new(MoawinAdapter::new(&config.moawin, fallbacks.clone())));
        router.register(Box::new(RumiAdapter::new(&config.rumi, fallbacks)));
        router
    }

    pub fn adapter(&self, region: Region) -> Option<&dyn SourceAdapter> {
        self.adapters.get(&region).map(|a| a.as_ref())
    }

    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.adapters.keys().copied().collect();
        regions.sort();
        regions
    }

    /// Route one metric read. Never fails: a missing adapter or an
    /// invariant-violating record resolves to the explicit unavailable
    /// placeholder so the dashboard always has something to render.
    pub fn dispatch(
        &self,
        selector: RegionSelector,
        metric: Metric,
        filter: &MetricFilter,
    ) -> MetricRecord {
        match selector {
            RegionSelector::Region(region) => {
                let Some(adapter) = self.adapter(region) else {
                    tracing::error!(%region, "no adapter registered");
                    return MetricRecord::unavailable();
                };
                let record = adapter.fetch(metric, filter);
                if let Err(err) = record.verify() {
                    tracing::error!(%region, %metric, error = %err, "adapter emitted inconsistent record");
                    return MetricRecord::unavailable();
                }
                record
            }
            RegionSelector::Combined => self.combined(metric, filter),
        }
    }

    /// Combined view: field-wise arithmetic union over the adapters whose
    /// record is active. Regions reporting not_applicable / no_data /
    /// launching are excluded from the aggregate, not treated as zero.
    fn combined(&self, metric: Metric, filter: &MetricFilter) -> MetricRecord {
        let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
        let mut kinds: Vec<Option<String>> = Vec::new();
        let mut active = 0u32;

        for region in Region::ALL {
            let Some(adapter) = self.adapter(region) else {
                continue;
            };
            if !adapter.measures(metric) {
                continue;
            }
            let record = adapter.fetch(metric, filter);
            if let Err(err) = record.verify() {
                tracing::error!(%region, %metric, error = %err, "excluding inconsistent record from aggregate");
                continue;
            }
            if !record.is_active() {
                continue;
            }
            active += 1;
            kinds.push(record.kind.clone());
            for (field, value) in &record.values {
                let entry = sums.entry(field.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        if active == 0 {
            return MetricRecord::unavailable();
        }

        let mut merged = MetricRecord::active();
        for (field, (sum, n)) in sums {
            let value = match merge_rule(&field) {
                MergeRule::Sum => sum,
                MergeRule::Mean => round1(ratio(sum, n as f64)),
            };
            merged = merged.with(&field, value);
        }
        // A uniform instrument label survives merging; mixed instruments
        // drop the label rather than mislabel the aggregate.
        if let Some(first) = kinds.first() {
            if kinds.iter().all(|k| k == first) {
                merged.kind = first.clone();
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::ScriptedAdapter;
    use crate::MetricStatus;

    fn router_with(records: Vec<(Region, Option<MetricRecord>)>) -> MetricRouter {
        let mut router = MetricRouter::new();
        for (region, record) in records {
            router.register(Box::new(ScriptedAdapter::new(region, record)));
        }
        router
    }

    #[test]
    fn merge_rules_classify_counts_and_rates() {
        assert_eq!(merge_rule("total"), MergeRule::Sum);
        assert_eq!(merge_rule("ai_count"), MergeRule::Sum);
        assert_eq!(merge_rule("benchmark_monthly"), MergeRule::Sum);
        assert_eq!(merge_rule("retention_7d"), MergeRule::Mean);
        assert_eq!(merge_rule("avg_score"), MergeRule::Mean);
        assert_eq!(merge_rule("b_avg"), MergeRule::Mean);
        assert_eq!(merge_rule("B7"), MergeRule::Mean);
        assert_eq!(merge_rule("per_teacher"), MergeRule::Mean);
    }

    #[test]
    fn combined_sums_counts_and_averages_rates_excluding_non_active() {
        let active = |total: f64, rate: f64| {
            Some(
                MetricRecord::active()
                    .with("total", total)
                    .with("retention_7d", rate),
            )
        };
        let router = router_with(vec![
            (Region::Ict, active(10.0, 10.0)),
            (Region::Balochistan, active(20.0, 20.0)),
            (Region::Moawin, Some(MetricRecord::not_applicable())),
        ]);

        let merged = router.dispatch(
            RegionSelector::Combined,
            Metric::Training,
            &MetricFilter::default(),
        );
        assert_eq!(merged.status, MetricStatus::Active);
        assert_eq!(merged.value("total"), Some(30.0));
        // Mean over the two active regions only, not dragged down by the
        // excluded region.
        assert_eq!(merged.value("retention_7d"), Some(15.0));
    }

    #[test]
    fn combined_with_no_active_region_is_unavailable() {
        let router = router_with(vec![
            (Region::Moawin, Some(MetricRecord::not_applicable())),
            (Region::Rumi, Some(MetricRecord::no_data())),
            (Region::Rawalpindi, Some(MetricRecord::launching())),
        ]);
        let merged = router.dispatch(
            RegionSelector::Combined,
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(merged.status, MetricStatus::NoData);
        assert!(merged.values.is_empty());
        assert!(merged.note.is_some());
    }

    #[test]
    fn combined_excludes_invariant_violations() {
        let broken = MetricRecord {
            status: MetricStatus::NoData,
            kind: None,
            note: None,
            values: [("total".to_string(), 99.0)].into_iter().collect(),
        };
        let router = router_with(vec![
            (Region::Ict, Some(MetricRecord::active().with("total", 10.0))),
            (Region::Balochistan, Some(broken)),
        ]);
        let merged = router.dispatch(
            RegionSelector::Combined,
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(merged.value("total"), Some(10.0));
    }

    #[test]
    fn combined_preserves_uniform_kind_and_drops_mixed() {
        let with_kind = |kind: &str| {
            Some(
                MetricRecord::active()
                    .with("total", 1.0)
                    .with_kind(kind),
            )
        };
        let uniform = router_with(vec![
            (Region::Ict, with_kind("Human (TEACH)")),
            (Region::Balochistan, with_kind("Human (TEACH)")),
        ]);
        let merged = uniform.dispatch(
            RegionSelector::Combined,
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(merged.kind.as_deref(), Some("Human (TEACH)"));

        let mixed = router_with(vec![
            (Region::Ict, with_kind("Human (TEACH)")),
            (Region::Balochistan, with_kind("AI + Human")),
        ]);
        let merged = mixed.dispatch(
            RegionSelector::Combined,
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(merged.kind, None);
    }

    #[test]
    fn named_region_routes_to_exactly_that_adapter() {
        let router = router_with(vec![
            (Region::Ict, Some(MetricRecord::active().with("total", 1.0))),
            (Region::Rumi, Some(MetricRecord::active().with("total", 2.0))),
        ]);
        let record = router.dispatch(
            RegionSelector::Region(Region::Rumi),
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(record.value("total"), Some(2.0));
    }

    #[test]
    fn unregistered_region_yields_unavailable_not_panic() {
        let router = MetricRouter::new();
        let record = router.dispatch(
            RegionSelector::Region(Region::Ict),
            Metric::Observations,
            &MetricFilter::default(),
        );
        assert_eq!(record.status, MetricStatus::NoData);
    }
}
