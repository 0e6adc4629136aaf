//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use plaudit_ledger::LedgerConfig;
use plaudit_verification::OrcidConfig;

use crate::logging::LogFormat;
use crate::NodeError;

/// Bounds on the session lifetime, in seconds.
pub const SESSION_TTL_RANGE: std::ops::RangeInclusive<u64> = 600..=1800;

/// Configuration for a Plaudit node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Call [`NodeConfig::validate`]
/// before use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// The single origin allowed by CORS.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default = "default_stats_cache_ttl_secs")]
    pub stats_cache_ttl_secs: u64,

    /// How many organizations the global stats list.
    #[serde(default = "default_top_organizations")]
    pub top_organizations: usize,

    /// Revoke a session after its first successful endorsement.
    #[serde(default)]
    pub single_use_sessions: bool,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// How often expired entries are physically removed. 0 disables.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,

    /// How often counters are reconciled against the records. Off when unset.
    #[serde(default)]
    pub reconcile_interval_secs: Option<u64>,

    /// Whether to expose the Prometheus `/metrics` endpoint.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub orcid: OrcidConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./plaudit_data")
}

fn default_map_size() -> usize {
    256 * 1024 * 1024
}

fn default_allowed_origin() -> String {
    "https://g5t.github.io".to_string()
}

fn default_session_ttl_secs() -> u64 {
    900
}

fn default_stats_cache_ttl_secs() -> u64 {
    300
}

fn default_top_organizations() -> usize {
    10
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_upstream_timeout_ms() -> u64 {
    5_000
}

fn default_purge_interval_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string. The ORCID client
    /// secret is never written out.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if !SESSION_TTL_RANGE.contains(&self.session_ttl_secs) {
            return Err(NodeError::Config(format!(
                "session_ttl_secs must be within {}..={}, got {}",
                SESSION_TTL_RANGE.start(),
                SESSION_TTL_RANGE.end(),
                self.session_ttl_secs
            )));
        }
        if self.stats_cache_ttl_secs == 0 {
            return Err(NodeError::Config("stats_cache_ttl_secs must be positive".into()));
        }
        if self.top_organizations == 0 {
            return Err(NodeError::Config("top_organizations must be positive".into()));
        }
        if self.store_timeout_ms == 0 || self.upstream_timeout_ms == 0 {
            return Err(NodeError::Config("timeouts must be positive".into()));
        }
        if self.reconcile_interval_secs == Some(0) {
            return Err(NodeError::Config(
                "reconcile_interval_secs must be positive when set".into(),
            ));
        }
        if self.allowed_origin.trim().is_empty() {
            return Err(NodeError::Config("allowed_origin must not be empty".into()));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            session_ttl_secs: self.session_ttl_secs,
            stats_cache_ttl_secs: self.stats_cache_ttl_secs,
            top_organizations: self.top_organizations,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            allowed_origin: default_allowed_origin(),
            session_ttl_secs: default_session_ttl_secs(),
            stats_cache_ttl_secs: default_stats_cache_ttl_secs(),
            top_organizations: default_top_organizations(),
            single_use_sessions: false,
            store_timeout_ms: default_store_timeout_ms(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            purge_interval_secs: default_purge_interval_secs(),
            reconcile_interval_secs: None,
            enable_metrics: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
            orcid: OrcidConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let s = config.to_toml_string().unwrap();
        let back = NodeConfig::from_toml_str(&s).unwrap();
        assert_eq!(back.listen_addr, config.listen_addr);
        assert_eq!(back.session_ttl_secs, 900);
        assert_eq!(back.allowed_origin, "https://g5t.github.io");
        assert_eq!(back.orcid.base_url, "https://orcid.org");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config.session_ttl_secs, 900);
        assert_eq!(config.stats_cache_ttl_secs, 300);
        assert_eq!(config.top_organizations, 10);
        assert_eq!(config.store_timeout_ms, 2_000);
        assert_eq!(config.upstream_timeout_ms, 5_000);
        assert_eq!(config.purge_interval_secs, 60);
        assert_eq!(config.reconcile_interval_secs, None);
        assert!(!config.single_use_sessions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = NodeConfig::from_toml_str(
            r#"
            listen_addr = "0.0.0.0:9000"
            session_ttl_secs = 1800
            single_use_sessions = true
            reconcile_interval_secs = 3600

            [orcid]
            client_id = "APP-1"
            client_secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.session_ttl_secs, 1800);
        assert!(config.single_use_sessions);
        assert_eq!(config.reconcile_interval_secs, Some(3600));
        assert_eq!(config.orcid.client_id, "APP-1");
        assert_eq!(config.orcid.client_secret, "s3cret");
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secret_is_not_serialized() {
        let mut config = NodeConfig::default();
        config.orcid.client_secret = "s3cret".into();
        assert!(!config.to_toml_string().unwrap().contains("s3cret"));
    }

    #[test]
    fn session_ttl_bounds() {
        for (ttl, ok) in [(599, false), (600, true), (1800, true), (1801, false)] {
            let config = NodeConfig {
                session_ttl_secs: ttl,
                ..NodeConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "ttl {ttl}");
        }
    }

    #[test]
    fn bad_log_format_rejected() {
        let config = NodeConfig {
            log_format: "xml".into(),
            ..NodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
