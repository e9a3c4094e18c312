use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// Default connect/read timeout for upstream queries. A slow store must not
/// stall a render beyond a bounded delay; timing out takes the same
/// fallback path as a hard failure.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

fn default_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

/// Connection settings for one upstream store. The adapter owning the store
/// is the only code permitted to hold these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store's SQL-over-HTTP endpoint
    pub endpoint: String,
    /// Database or dataset name within the store
    pub database: String,
    /// Bearer credential for the read-only analyst role
    pub credential: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StoreConfig {
    /// Read `{PREFIX}_ENDPOINT`, `{PREFIX}_DATABASE` and `{PREFIX}_CREDENTIAL`
    /// from the environment. A missing variable fails construction at
    /// startup rather than yielding a client that errors on every call.
    pub fn from_env(prefix: &str) -> Result<Self, DashboardError> {
        let var = |suffix: &str| {
            let name = format!("{}_{}", prefix, suffix);
            std::env::var(&name).map_err(|_| DashboardError::Config(format!("{} is not set", name)))
        };
        let timeout_secs = match std::env::var(format!("{}_TIMEOUT_SECS", prefix)) {
            Ok(raw) => raw.parse().map_err(|_| {
                DashboardError::Config(format!("{}_TIMEOUT_SECS is not a number", prefix))
            })?,
            Err(_) => DEFAULT_QUERY_TIMEOUT_SECS,
        };
        Ok(Self {
            endpoint: var("ENDPOINT")?,
            database: var("DATABASE")?,
            credential: var("CREDENTIAL")?,
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8432".to_string(),
            database: "postgres".to_string(),
            credential: String::new(),
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

/// Store configuration for the whole dashboard. ICT and RWP read the shared
/// analytics warehouse; Balochistan additionally owns its regional
/// database, as do Moawin and Rumi.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub warehouse: StoreConfig,
    pub balochistan: StoreConfig,
    pub moawin: StoreConfig,
    pub rumi: StoreConfig,
    /// Directory the offline refresh job writes its JSON snapshots to
    pub cache_dir: PathBuf,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, DashboardError> {
        Ok(Self {
            warehouse: StoreConfig::from_env("WAREHOUSE")?,
            balochistan: StoreConfig::from_env("BALOCHISTAN_DB")?,
            moawin: StoreConfig::from_env("MOAWIN_DB")?,
            rumi: StoreConfig::from_env("RUMI_DB")?,
            cache_dir: std::env::var("OBSDASH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/cache")),
        })
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            warehouse: StoreConfig::default(),
            balochistan: StoreConfig::default(),
            moawin: StoreConfig::default(),
            rumi: StoreConfig::default(),
            cache_dir: PathBuf::from("data/cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_fails_fast() {
        std::env::remove_var("OBSTEST_A_ENDPOINT");
        let err = StoreConfig::from_env("OBSTEST_A").unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
        assert!(err.to_string().contains("OBSTEST_A_ENDPOINT"));
    }

    #[test]
    fn from_env_reads_all_fields() {
        std::env::set_var("OBSTEST_B_ENDPOINT", "https://warehouse.example");
        std::env::set_var("OBSTEST_B_DATABASE", "analytics");
        std::env::set_var("OBSTEST_B_CREDENTIAL", "secret");
        std::env::set_var("OBSTEST_B_TIMEOUT_SECS", "5");

        let config = StoreConfig::from_env("OBSTEST_B").unwrap();
        assert_eq!(config.endpoint, "https://warehouse.example");
        assert_eq!(config.database, "analytics");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn default_timeout_is_bounded() {
        let config = StoreConfig::default();
        assert!(config.timeout() >= Duration::from_secs(5));
        assert!(config.timeout() <= Duration::from_secs(10));
    }
}
