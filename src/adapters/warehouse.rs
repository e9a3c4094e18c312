//! Shared queries against the analytics warehouse's unified cross-program
//! views. ICT, Balochistan and RWP engagement metrics all read these views
//! filtered to their program key.

use crate::error::DashboardError;
use crate::store::{f64_col, ratio, round1, HttpStore};
use crate::{MetricRecord, TimeWindow};

use super::warehouse_window;

/// Engagement metric from a unified usage view: total interaction count,
/// unique teachers and the per-teacher rate. A zero total is `no_data`
/// (nothing recorded for the program yet), not a zero-valued active record.
pub(crate) fn engagement_record(
    store: &HttpStore,
    view: &str,
    count_field: &str,
    program: &str,
    window: TimeWindow,
) -> Result<MetricRecord, DashboardError> {
    let sql = format!(
        "SELECT COUNT(*) AS total, COUNT(DISTINCT user_id) AS unique_teachers \
         FROM {} WHERE LOWER(program) = '{}' {}",
        view,
        program,
        warehouse_window(window, "timestamp")
    );
    let row = store.query_one(&sql)?;
    let total = f64_col(&row, "total").ok_or(DashboardError::Malformed {
        store: store.name(),
        reason: "missing total column".to_string(),
    })?;
    if total == 0.0 {
        return Ok(MetricRecord::no_data());
    }
    let teachers = f64_col(&row, "unique_teachers").unwrap_or(0.0);
    Ok(MetricRecord::active()
        .with(count_field, total)
        .with("unique_teachers", teachers)
        .with("per_teacher", round1(ratio(total, teachers))))
}

/// Retention from the unified events view: share of known users active in
/// the last 7 and 30 days.
pub(crate) fn retention_record(
    store: &HttpStore,
    program: &str,
) -> Result<MetricRecord, DashboardError> {
    let sql = format!(
        "SELECT \
           COUNT(DISTINCT CASE WHEN timestamp > TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 7 DAY) \
             THEN user_id END) AS active_7d, \
           COUNT(DISTINCT CASE WHEN timestamp > TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 30 DAY) \
             THEN user_id END) AS active_30d, \
           COUNT(DISTINCT user_id) AS total_users \
         FROM unified_events WHERE LOWER(program) = '{}'",
        program
    );
    let row = store.query_one(&sql)?;
    let total = f64_col(&row, "total_users").ok_or(DashboardError::Malformed {
        store: store.name(),
        reason: "missing total_users column".to_string(),
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
        .with("retention_30d", round1(ratio(active_30d, total) * 100.0)))
}
