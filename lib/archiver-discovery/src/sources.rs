//! Candidate sources for the seed roster.
//!
//! Three independent, untrusted producers of archiver entries:
//! - **Environment**: `ip:port:publicKey` triples, comma-separated
//! - **Config file**: the `archivers` array of the configuration file
//! - **Remote seed list**: downloaded from `archiversUrl` into a local cache
//!   file, falling back to the cached copy when the download fails
//!
//! None of them validates entries and none of them fails: every problem is
//! logged and turns into fewer (or zero) candidates.

use crate::config::ArchiverConfig;
use crate::error::DiscoveryError;
use crate::types::CandidateEndpoint;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read candidates from the environment variable `var_name`.
pub fn from_env(var_name: &str) -> Vec<CandidateEndpoint> {
    match std::env::var(var_name) {
        Ok(raw) if raw.trim().is_empty() => {
            info!("Environment variable {} is empty", var_name);
            Vec::new()
        }
        Ok(raw) => {
            let candidates = parse_env_value(&raw);
            if candidates.is_empty() {
                info!("Environment variable {} contains no archivers", var_name);
            }
            candidates
        }
        Err(_) => {
            info!("Environment variable {} is not defined", var_name);
            Vec::new()
        }
    }
}

/// Parse `ip:port:publicKey[,ip:port:publicKey...]`.
///
/// Blank items are skipped. Missing or unparsable parts are left empty on the
/// candidate so validation can reject it.
pub fn parse_env_value(raw: &str) -> Vec<CandidateEndpoint> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_env_entry)
        .collect()
}

fn parse_env_entry(entry: &str) -> CandidateEndpoint {
    let mut parts = entry.split(':').map(str::trim);
    let ip = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let port = parts.next().and_then(|p| p.parse::<i64>().ok());
    let public_key = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    CandidateEndpoint {
        ip,
        port,
        public_key,
    }
}

/// Candidates listed under `archivers` in the configuration file.
pub fn from_config(config: &ArchiverConfig) -> Vec<CandidateEndpoint> {
    match &config.archivers {
        Some(entries) if !entries.is_empty() => candidates_from_values(entries),
        _ => {
            info!("Archivers not found in config");
            Vec::new()
        }
    }
}

/// Candidates from the remote seed list named by `archiversUrl`.
///
/// A successful download overwrites `cache_path`; the candidates are then read
/// from the cache file, so a failed download serves the last good copy.
pub async fn from_remote_or_cache(
    config: &ArchiverConfig,
    cache_path: &Path,
    client: &reqwest::Client,
) -> Vec<CandidateEndpoint> {
    let Some(url) = config.archivers_url.as_deref() else {
        info!("Archivers URL not found in config");
        return Vec::new();
    };

    match download_seed_list(client, url, cache_path).await {
        Ok(()) => info!(
            "Downloaded seed list from {} and saved to {}",
            url,
            cache_path.display()
        ),
        Err(e) => warn!(
            url = %url,
            cache = %cache_path.display(),
            error = %e,
            "Failed to download seed list, using cached copy"
        ),
    }

    read_cached_seed_list(cache_path).await
}

/// Download the seed list at `url` and overwrite `cache_path` with it.
///
/// The cache is only replaced by a JSON array.
pub async fn download_seed_list(
    client: &reqwest::Client,
    url: &str,
    cache_path: &Path,
) -> Result<(), DiscoveryError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body: Value = response.json().await?;

    if !body.is_array() {
        return Err(DiscoveryError::InvalidSeedList(format!(
            "{} did not return a JSON array",
            url
        )));
    }

    if let Some(parent) = cache_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_string_pretty(&body)?;
    tokio::fs::write(cache_path, contents).await?;
    Ok(())
}

/// Read the cached seed list. Missing or malformed files yield no candidates.
pub async fn read_cached_seed_list(cache_path: &Path) -> Vec<CandidateEndpoint> {
    let contents = match tokio::fs::read_to_string(cache_path).await {
        Ok(contents) => contents,
        Err(e) => {
            info!(cache = %cache_path.display(), error = %e, "Unable to read seed list cache");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(value) => candidates_from_json(&value),
        Err(e) => {
            warn!(cache = %cache_path.display(), error = %e, "Seed list cache is not valid JSON");
            Vec::new()
        }
    }
}

/// Interpret a JSON array of archiver objects. Entries that do not have the
/// archiver shape are dropped individually.
pub fn candidates_from_json(value: &Value) -> Vec<CandidateEndpoint> {
    match value.as_array() {
        Some(entries) => candidates_from_values(entries),
        None => {
            warn!("Seed list is not a JSON array");
            Vec::new()
        }
    }
}

fn candidates_from_values(entries: &[Value]) -> Vec<CandidateEndpoint> {
    entries
        .iter()
        .filter_map(
            |entry| match serde_json::from_value::<CandidateEndpoint>(entry.clone()) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Skipping malformed archiver entry");
                    None
                }
            },
        )
        .inspect(|candidate| debug!(candidate = %candidate, "Read archiver candidate"))
        .collect()
}
