//! Failover HTTP client over the live roster

use crate::crypto::{Ed25519Verifier, PayloadVerifier};
use crate::roster::LiveRoster;
use crate::types::Endpoint;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single archiver's response was discarded.
#[derive(Error, Debug)]
enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unusable status {0}")]
    Status(StatusCode),
    #[error("empty response body")]
    EmptyBody,
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("signature verification failed")]
    Unverified,
}

/// Per-call request settings layered over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Bound on each attempt, replacing the client-wide timeout
    pub timeout: Option<Duration>,
    /// Extra headers sent to every archiver tried
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Queries archivers one at a time in roster order until one answers.
///
/// The archiver that answers is moved to the front of the roster, so the next
/// request starts with the last known good archiver.
#[derive(Clone)]
pub struct FailoverClient {
    client: reqwest::Client,
    roster: LiveRoster,
    verifier: Arc<dyn PayloadVerifier>,
}

impl FailoverClient {
    pub fn new(roster: LiveRoster) -> Self {
        Self::with_timeout(roster, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(roster: LiveRoster, timeout: Duration) -> Self {
        Self::with_verifier(roster, timeout, Arc::new(Ed25519Verifier::new()))
    }

    pub fn with_verifier(
        roster: LiveRoster,
        timeout: Duration,
        verifier: Arc<dyn PayloadVerifier>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            roster,
            verifier,
        }
    }

    pub fn roster(&self) -> &LiveRoster {
        &self.roster
    }

    /// Underlying HTTP client, shared with the remote seed list download.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// `GET /{endpoint}` from the first archiver that returns a usable body.
    ///
    /// Returns `None` when every archiver failed; the roster order is then
    /// left as it was.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Option<T> {
        self.fetch(endpoint, &RequestOptions::default(), false).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Option<T> {
        self.fetch(endpoint, options, false).await
    }

    /// Like [`get`](Self::get), but a response only counts when its embedded
    /// signature verifies against the archiver that sent it.
    pub async fn get_signed<T: DeserializeOwned>(&self, endpoint: &str) -> Option<T> {
        self.fetch(endpoint, &RequestOptions::default(), true).await
    }

    pub async fn get_signed_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Option<T> {
        self.fetch(endpoint, options, true).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        signed: bool,
    ) -> Option<T> {
        let archivers = self.roster.snapshot();

        for archiver in &archivers {
            match self.attempt(archiver, endpoint, options, signed).await {
                Ok(value) => {
                    debug!(archiver = %archiver, endpoint = %endpoint, "Archiver responded");
                    self.roster.promote(archiver);
                    return Some(value);
                }
                Err(e) => warn!(
                    ip = %archiver.ip,
                    port = archiver.port,
                    endpoint = %endpoint,
                    error = %e,
                    "Failed to fetch data from archiver"
                ),
            }
        }

        warn!(
            endpoint = %endpoint,
            tried = archivers.len(),
            "No archiver returned a usable response"
        );
        None
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        archiver: &Endpoint,
        endpoint: &str,
        options: &RequestOptions,
        signed: bool,
    ) -> Result<T, AttemptError> {
        let mut request = self
            .client
            .get(archiver.url(endpoint))
            .headers(options.headers.clone());
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        // Anything outside 2xx-4xx is unusable, including non-standard codes above 599.
        let status = response.status();
        if !(200..500).contains(&status.as_u16()) {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AttemptError::EmptyBody);
        }

        let value: Value = serde_json::from_slice(&body)?;
        if value.is_null() {
            return Err(AttemptError::EmptyBody);
        }

        if signed && !self.verifier.verify(&value, archiver) {
            return Err(AttemptError::Unverified);
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failover_client_shares_roster() {
        let roster = LiveRoster::new(vec![Endpoint::new("127.0.0.1", 4000, "pk")]);
        let client = FailoverClient::new(roster.clone());

        roster.replace(vec![
            Endpoint::new("127.0.0.1", 4001, "pk2"),
            Endpoint::new("127.0.0.1", 4000, "pk"),
        ]);
        assert_eq!(client.roster().len(), 2);
    }

    #[tokio::test]
    async fn test_get_with_empty_roster() {
        let client = FailoverClient::new(LiveRoster::default());
        let result: Option<Value> = client.get("archivers").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_unreachable_archivers_leaves_order() {
        let roster = LiveRoster::new(vec![
            Endpoint::new("127.0.0.1", 1, "a"),
            Endpoint::new("127.0.0.1", 2, "b"),
        ]);
        let client = FailoverClient::with_timeout(roster.clone(), Duration::from_millis(500));

        let result: Option<Value> = client.get("archivers").await;
        assert!(result.is_none());

        let keys: Vec<_> = roster.snapshot().into_iter().map(|e| e.public_key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_attempt_error_display() {
        assert_eq!(
            AttemptError::Status(StatusCode::BAD_GATEWAY).to_string(),
            "unusable status 502 Bad Gateway"
        );
        assert_eq!(AttemptError::EmptyBody.to_string(), "empty response body");
    }
}
