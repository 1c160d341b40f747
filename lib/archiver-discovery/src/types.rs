//! Archiver endpoint types for sources, rosters and API responses

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A validated archiver endpoint. The public key is the archiver's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
    pub public_key: String,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16, public_key: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            public_key: public_key.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// URL for `path` on this archiver. A leading `/` on `path` is ignored.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Unvalidated archiver entry as read from a source.
///
/// Every field is optional and the port is kept wide so that malformed entries
/// survive parsing and can be rejected individually by validation. Seed lists
/// written by hand often quote the port, so `"8080"` is read as `8080`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEndpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Accept an integer, a whole float or a numeric string. Anything else that is
/// a number or string becomes `None` and fails validation as a missing port.
fn lenient_port<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let port = match Option::<RawPort>::deserialize(deserializer)? {
        None => None,
        Some(RawPort::Integer(port)) => Some(port),
        Some(RawPort::Float(port)) if port.fract() == 0.0 && port.abs() < i64::MAX as f64 => {
            Some(port as i64)
        }
        Some(RawPort::Float(_)) => None,
        Some(RawPort::Text(port)) => port.trim().parse().ok(),
    };
    Ok(port)
}

impl CandidateEndpoint {
    pub fn new(ip: impl Into<String>, port: i64, public_key: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            port: Some(port),
            public_key: Some(public_key.into()),
        }
    }
}

impl From<Endpoint> for CandidateEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            ip: Some(endpoint.ip),
            port: Some(i64::from(endpoint.port)),
            public_key: Some(endpoint.public_key),
        }
    }
}

impl fmt::Display for CandidateEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = self.ip.as_deref().unwrap_or("?");
        let port = self
            .port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        let key = self.public_key.as_deref().unwrap_or("?");
        write!(f, "{}:{}:{}", ip, port, key)
    }
}

/// Signature envelope attached to signed archiver payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sign {
    /// Hex encoded Ed25519 public key of the signer
    pub owner: String,
    /// Hex encoded Ed25519 signature
    pub sig: String,
}

/// Response of `GET /archivers`: the signed list of currently active archivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveArchivers {
    pub active_archivers: Vec<CandidateEndpoint>,
    pub sign: Sign,
}
