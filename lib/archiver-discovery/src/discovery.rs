//! Discovery lifecycle: setup, the roster accessor and the process-wide facade.
//!
//! [`Discovery`] owns everything produced by a setup run. Most processes use
//! the free functions instead, which keep one `Discovery` in a global slot:
//!
//! ```no_run
//! # async fn run() -> Result<(), archiver_discovery::DiscoveryError> {
//! use archiver_discovery::{DiscoveryConfig, archiver_list, get_from_archiver, setup};
//!
//! setup(DiscoveryConfig::from_env()?).await?;
//! let roster = archiver_list()?;
//! let cycle: Option<serde_json::Value> = get_from_archiver("cycleinfo/1").await?;
//! # Ok(())
//! # }
//! ```

use crate::bootstrap;
use crate::client::{FailoverClient, RequestOptions};
use crate::config::{ArchiverConfig, DiscoveryConfig};
use crate::crypto::{Ed25519Verifier, PayloadVerifier};
use crate::error::DiscoveryError;
use crate::roster::{LiveRoster, build_roster};
use crate::sources;
use crate::types::{CandidateEndpoint, Endpoint};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use tracing::info;

/// The raw output of each candidate source, before any merging.
#[derive(Debug, Clone, Default)]
pub struct CandidateSets {
    pub env: Vec<CandidateEndpoint>,
    pub config: Vec<CandidateEndpoint>,
    pub remote: Vec<CandidateEndpoint>,
}

impl CandidateSets {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.config.is_empty() && self.remote.is_empty()
    }
}

/// Read all three candidate sources without validating or merging them.
pub async fn candidate_sets(config: &DiscoveryConfig) -> CandidateSets {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .unwrap_or_default();
    read_sources(config, &client).await
}

async fn read_sources(config: &DiscoveryConfig, client: &reqwest::Client) -> CandidateSets {
    let archiver_config = ArchiverConfig::load(&config.config_path).await;
    CandidateSets {
        env: sources::from_env(&config.env_var),
        config: sources::from_config(&archiver_config),
        remote: sources::from_remote_or_cache(&archiver_config, &config.cache_path, client).await,
    }
}

/// State produced by a successful setup.
pub struct Discovery {
    config: DiscoveryConfig,
    client: Option<FailoverClient>,
}

impl Discovery {
    /// Build the seed roster from every source and resolve it against the
    /// archivers' signed active list, verifying with Ed25519 and the
    /// configured trusted signers.
    pub async fn setup(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let verifier = Ed25519Verifier::with_trusted_signers(config.trusted_signers.clone());
        Self::setup_with_verifier(config, Arc::new(verifier)).await
    }

    pub async fn setup_with_verifier(
        config: DiscoveryConfig,
        verifier: Arc<dyn PayloadVerifier>,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;

        if config.skip_roster_init {
            info!("Skipping archiver roster initialization");
            return Ok(Self {
                config,
                client: None,
            });
        }

        let client =
            FailoverClient::with_verifier(LiveRoster::default(), config.request_timeout, verifier);
        let sets = read_sources(&config, client.http()).await;
        let seed = build_roster(sets.env, sets.config, sets.remote, &mut rand::thread_rng())?;
        info!(seed = seed.len(), "Built seed archiver roster");

        bootstrap::resolve(seed, &client).await?;

        Ok(Self {
            config,
            client: Some(client),
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn client(&self) -> Result<&FailoverClient, DiscoveryError> {
        self.client.as_ref().ok_or(DiscoveryError::NotInitialized)
    }

    /// Current roster in trial order.
    pub fn archivers(&self) -> Result<Vec<Endpoint>, DiscoveryError> {
        Ok(self.client()?.roster().snapshot())
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, DiscoveryError> {
        Ok(self.client()?.get(endpoint).await)
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Option<T>, DiscoveryError> {
        Ok(self.client()?.get_with(endpoint, options).await)
    }

    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Option<T>, DiscoveryError> {
        Ok(self.client()?.get_signed(endpoint).await)
    }

    pub async fn get_signed_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Option<T>, DiscoveryError> {
        Ok(self.client()?.get_signed_with(endpoint, options).await)
    }
}

static DISCOVERY: RwLock<Option<Arc<Discovery>>> = RwLock::new(None);

fn current() -> Result<Arc<Discovery>, DiscoveryError> {
    DISCOVERY
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or(DiscoveryError::NotInitialized)
}

/// Run setup and install the result as the process-wide discovery state.
///
/// A failed setup leaves any previously installed state in place.
pub async fn setup(config: DiscoveryConfig) -> Result<(), DiscoveryError> {
    let discovery = Discovery::setup(config).await?;
    *DISCOVERY.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(discovery));
    Ok(())
}

/// Current process-wide roster.
pub fn archiver_list() -> Result<Vec<Endpoint>, DiscoveryError> {
    current()?.archivers()
}

pub async fn get_from_archiver<T: DeserializeOwned>(
    endpoint: &str,
) -> Result<Option<T>, DiscoveryError> {
    current()?.get(endpoint).await
}

pub async fn get_signed_from_archiver<T: DeserializeOwned>(
    endpoint: &str,
) -> Result<Option<T>, DiscoveryError> {
    current()?.get_signed(endpoint).await
}

/// [`get_from_archiver`] with per-call timeout and headers.
pub async fn get_from_archiver_with<T: DeserializeOwned>(
    endpoint: &str,
    options: &RequestOptions,
) -> Result<Option<T>, DiscoveryError> {
    current()?.get_with(endpoint, options).await
}

pub async fn get_signed_from_archiver_with<T: DeserializeOwned>(
    endpoint: &str,
    options: &RequestOptions,
) -> Result<Option<T>, DiscoveryError> {
    current()?.get_signed_with(endpoint, options).await
}
