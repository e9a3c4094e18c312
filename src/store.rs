//! Blocking SQL-over-HTTP query client shared by all source adapters.
//!
//! Every upstream store (the columnar warehouse and the regional
//! PostgreSQL-compatible databases) exposes the same query surface:
//! `POST {endpoint}/query` with a JSON body naming the database and the SQL
//! text, answered with a JSON row set. The client is built per call with an
//! explicit timeout, so a slow store surfaces as an error and takes the
//! adapter's fallback path.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::DashboardError;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

#[derive(Deserialize)]
struct QueryResponse {
    rows: Vec<Row>,
}

pub struct HttpStore {
    name: &'static str,
    endpoint: String,
    database: String,
    credential: String,
    timeout: Duration,
}

impl HttpStore {
    pub fn new(name: &'static str, config: &StoreConfig) -> Self {
        Self {
            name,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            credential: config.credential.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Execute one query and return its rows. Connection, timeout and HTTP
    /// errors map to `Unreachable`; undecodable bodies map to `Malformed`.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>, DashboardError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DashboardError::Unreachable {
                store: self.name,
                reason: e.to_string(),
            })?;

        let response = client
            .post(format!("{}/query", self.endpoint))
            .bearer_auth(&self.credential)
            .json(&serde_json::json!({ "database": self.database, "sql": sql }))
            .send()
            .map_err(|e| DashboardError::Unreachable {
                store: self.name,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DashboardError::Unreachable {
                store: self.name,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: QueryResponse = response.json().map_err(|e| DashboardError::Malformed {
            store: self.name,
            reason: e.to_string(),
        })?;
        Ok(body.rows)
    }

    /// Execute a query expected to return exactly one aggregate row.
    pub fn query_one(&self, sql: &str) -> Result<Row, DashboardError> {
        self.query(sql)?
            .into_iter()
            .next()
            .ok_or(DashboardError::Malformed {
                store: self.name,
                reason: "empty result set".to_string(),
            })
    }
}

/// Numeric column read, tolerant of drivers that emit numbers as strings.
pub fn f64_col(row: &Row, name: &str) -> Option<f64> {
    match row.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn i64_col(row: &Row, name: &str) -> Option<i64> {
    match row.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Division guard for derived rates: a zero denominator yields 0, never an
/// exception or NaN.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
