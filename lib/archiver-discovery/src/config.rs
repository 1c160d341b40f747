//! Discovery settings and the archiver configuration file.

use crate::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default environment variable holding `ip:port:publicKey` triples.
pub const DEFAULT_ENV_VAR: &str = "ARCHIVER_INFO";
/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Default cache file for the remotely published seed list.
pub const DEFAULT_CACHE_PATH: &str = "archiver-seed-list.json";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Process-wide discovery settings, fixed at setup.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Environment variable read by the environment source
    pub env_var: String,
    /// Path of the JSON configuration file
    pub config_path: PathBuf,
    /// Path of the seed list cache file
    pub cache_path: PathBuf,
    /// Bound on every single archiver request
    pub request_timeout: Duration,
    /// Hex encoded Ed25519 keys trusted to sign payloads on behalf of any archiver
    pub trusted_signers: Vec<String>,
    /// Skip building the live roster (source-only use)
    pub skip_roster_init: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_ENV_VAR.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            trusted_signers: Vec::new(),
            skip_roster_init: false,
        }
    }
}

impl DiscoveryConfig {
    /// Load overrides from environment variables, falling back to defaults.
    ///
    /// - `ARCHIVER_DISCOVERY_ENV_VAR`: name of the archiver list variable
    /// - `ARCHIVER_CONFIG_PATH`: configuration file path
    /// - `ARCHIVER_SEED_CACHE_PATH`: seed list cache path
    /// - `ARCHIVER_REQUEST_TIMEOUT_MS`: per-request timeout in milliseconds
    /// - `ARCHIVER_TRUSTED_SIGNERS`: comma-separated hex public keys
    pub fn from_env() -> Result<Self, DiscoveryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, DiscoveryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let env_var = lookup("ARCHIVER_DISCOVERY_ENV_VAR")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.env_var);

        let config_path = lookup("ARCHIVER_CONFIG_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.config_path);

        let cache_path = lookup("ARCHIVER_SEED_CACHE_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);

        let request_timeout = match lookup("ARCHIVER_REQUEST_TIMEOUT_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                let ms: u64 = raw.trim().parse().map_err(|e| {
                    DiscoveryError::Config(format!(
                        "ARCHIVER_REQUEST_TIMEOUT_MS must be a valid number: {}",
                        e
                    ))
                })?;
                Duration::from_millis(ms)
            }
            _ => defaults.request_timeout,
        };

        let trusted_signers = lookup("ARCHIVER_TRUSTED_SIGNERS")
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            env_var,
            config_path,
            cache_path,
            request_timeout,
            trusted_signers,
            skip_roster_init: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.request_timeout.is_zero() {
            return Err(DiscoveryError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        if self.env_var.is_empty() {
            return Err(DiscoveryError::Config(
                "env_var must not be empty".to_string(),
            ));
        }
        for key in &self.trusted_signers {
            if hex::decode(key).map(|b| b.len() != 32).unwrap_or(true) {
                return Err(DiscoveryError::Config(format!(
                    "trusted signer '{}' is not a 32 byte hex key",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Contents of the archiver configuration file.
///
/// Only `archivers` and `archiversUrl` are interpreted; every other key is
/// kept in `extra` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiverConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archivers: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archivers_url: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ArchiverConfig {
    /// Read the configuration file. A missing, unreadable or malformed file
    /// yields an empty configuration.
    pub async fn load(path: &Path) -> Self {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to read local config file");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded archiver config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to parse local config file");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DiscoveryConfig, DiscoveryError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DiscoveryConfig::from_lookup(|key| map.get(key).cloned())
    }

    // ==================== DiscoveryConfig Tests ====================

    #[test]
    fn test_discovery_config_default() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.env_var, "ARCHIVER_INFO");
        assert_eq!(config.config_path, PathBuf::from("config.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.trusted_signers.is_empty());
        assert!(!config.skip_roster_init);
    }

    #[test]
    fn test_discovery_config_from_lookup_overrides() {
        let key = "11".repeat(32);
        let signers = format!(" {} ,", key);
        let config = config_from(&[
            ("ARCHIVER_DISCOVERY_ENV_VAR", "MY_ARCHIVERS"),
            ("ARCHIVER_CONFIG_PATH", "/etc/archiver.json"),
            ("ARCHIVER_SEED_CACHE_PATH", "/tmp/seed.json"),
            ("ARCHIVER_REQUEST_TIMEOUT_MS", "2500"),
            ("ARCHIVER_TRUSTED_SIGNERS", signers.as_str()),
        ])
        .unwrap();

        assert_eq!(config.env_var, "MY_ARCHIVERS");
        assert_eq!(config.config_path, PathBuf::from("/etc/archiver.json"));
        assert_eq!(config.cache_path, PathBuf::from("/tmp/seed.json"));
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.trusted_signers, vec![key]);
    }

    #[test]
    fn test_discovery_config_invalid_timeout() {
        let result = config_from(&[("ARCHIVER_REQUEST_TIMEOUT_MS", "soon")]);
        assert!(matches!(result, Err(DiscoveryError::Config(_))));

        let result = config_from(&[("ARCHIVER_REQUEST_TIMEOUT_MS", "0")]);
        assert!(matches!(result, Err(DiscoveryError::Config(_))));
    }

    #[test]
    fn test_discovery_config_invalid_signer() {
        let result = config_from(&[("ARCHIVER_TRUSTED_SIGNERS", "abcd")]);
        assert!(matches!(result, Err(DiscoveryError::Config(_))));
    }

    // ==================== ArchiverConfig Tests ====================

    #[test]
    fn test_archiver_config_keeps_unknown_fields() {
        let config: ArchiverConfig = serde_json::from_value(serde_json::json!({
            "archiversUrl": "https://example.com/archivers.json",
            "randomConfig": "randomConfig",
            "randomConfig2": {"test": "test"}
        }))
        .unwrap();

        assert!(config.archivers.is_none());
        assert_eq!(
            config.archivers_url.as_deref(),
            Some("https://example.com/archivers.json")
        );
        assert_eq!(config.extra.len(), 2);
        assert_eq!(config.extra["randomConfig2"]["test"], "test");
    }

    #[tokio::test]
    async fn test_archiver_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiverConfig::load(&dir.path().join("missing.json")).await;
        assert!(config.archivers.is_none());
        assert!(config.archivers_url.is_none());
    }

    #[tokio::test]
    async fn test_archiver_config_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let config = ArchiverConfig::load(file.path()).await;
        assert!(config.archivers.is_none());
        assert!(config.extra.is_empty());
    }

    #[tokio::test]
    async fn test_archiver_config_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"archivers": [{{"ip": "10.11.12.13", "port": 8080, "publicKey": "pk1"}}]}}"#
        )
        .unwrap();
        let config = ArchiverConfig::load(file.path()).await;
        assert_eq!(config.archivers.map(|a| a.len()), Some(1));
    }
}
