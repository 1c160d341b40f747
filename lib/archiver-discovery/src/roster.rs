//! Roster construction and the shared live roster.
//!
//! A roster is an ordered list of archivers, unique by public key. Order is
//! the trial order for requests: the first entry is tried first.

use crate::error::{DiscoveryError, ValidationError};
use crate::types::{CandidateEndpoint, Endpoint};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// A candidate dropped by validation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub candidate: CandidateEndpoint,
    pub reason: ValidationError,
}

/// Check a single candidate and convert it into an [`Endpoint`].
///
/// The ip must be a dotted-quad IPv4 literal or exactly `localhost`, the port
/// must lie in `0..=65535` and the public key must be non-empty.
pub fn validate_candidate(candidate: &CandidateEndpoint) -> Result<Endpoint, ValidationError> {
    let ip = match candidate.ip.as_deref() {
        None | Some("") => return Err(ValidationError::MissingIp),
        Some(ip) => ip,
    };
    if ip != "localhost" && ip.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError::InvalidIp(ip.to_string()));
    }

    let port = candidate.port.ok_or(ValidationError::MissingPort)?;
    let port = u16::try_from(port).map_err(|_| ValidationError::InvalidPort(port))?;

    let public_key = match candidate.public_key.as_deref() {
        None | Some("") => return Err(ValidationError::MissingPublicKey),
        Some(key) => key,
    };

    Ok(Endpoint::new(ip, port, public_key))
}

/// Validate every candidate, keeping the survivors in input order.
pub fn sanitize(candidates: &[CandidateEndpoint]) -> (Vec<Endpoint>, Vec<Rejection>) {
    let mut valid = Vec::with_capacity(candidates.len());
    let mut rejected = Vec::new();

    for candidate in candidates {
        match validate_candidate(candidate) {
            Ok(endpoint) => valid.push(endpoint),
            Err(reason) => {
                warn!(candidate = %candidate, error = %reason, "Dropping invalid archiver");
                rejected.push(Rejection {
                    candidate: candidate.clone(),
                    reason,
                });
            }
        }
    }

    (valid, rejected)
}

/// Remove later entries whose public key was already seen.
pub fn dedup_by_public_key(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::with_capacity(endpoints.len());
    endpoints
        .into_iter()
        .filter(|endpoint| seen.insert(endpoint.public_key.clone()))
        .collect()
}

/// Merge the three candidate sets into the seed roster.
///
/// Each set is shuffled on its own, then the sets are concatenated in
/// precedence order (environment, config, remote) so that on a key collision
/// the entry from the higher tier survives.
pub fn build_roster<R: Rng + ?Sized>(
    env: Vec<CandidateEndpoint>,
    config: Vec<CandidateEndpoint>,
    remote: Vec<CandidateEndpoint>,
    rng: &mut R,
) -> Result<Vec<Endpoint>, DiscoveryError> {
    let mut merged = Vec::with_capacity(env.len() + config.len() + remote.len());
    for mut tier in [env, config, remote] {
        tier.shuffle(rng);
        merged.append(&mut tier);
    }

    let (valid, rejected) = sanitize(&merged);
    let roster = dedup_by_public_key(valid);
    debug!(
        candidates = merged.len(),
        rejected = rejected.len(),
        roster = roster.len(),
        "Built seed roster"
    );

    if roster.is_empty() {
        return Err(DiscoveryError::NoCandidates);
    }
    Ok(roster)
}

/// Shared, ordered roster of live archivers.
///
/// Cloning is cheap and every clone observes the same list. Locks are held
/// only for the duration of a read or a single read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct LiveRoster {
    inner: Arc<RwLock<Vec<Endpoint>>>,
}

impl LiveRoster {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dedup_by_public_key(endpoints))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Endpoint>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Endpoint>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current order.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.read().clone()
    }

    pub fn replace(&self, endpoints: Vec<Endpoint>) {
        *self.write() = dedup_by_public_key(endpoints);
    }

    /// Move `endpoint` to the front. Everything else keeps its relative order.
    pub fn promote(&self, endpoint: &Endpoint) {
        let mut guard = self.write();
        let mut reordered = Vec::with_capacity(guard.len() + 1);
        reordered.push(endpoint.clone());
        reordered.extend(guard.drain(..));
        *guard = dedup_by_public_key(reordered);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
