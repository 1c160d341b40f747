//! Bootstrap from the seed roster to the active archiver roster.
//!
//! # Algorithm
//!
//! 1. Install the seed roster and request `GET /archivers` through the
//!    failover client, accepting only a response signed by the archiver that
//!    sent it (or by a trusted signer)
//! 2. **No verified response**: fail with [`DiscoveryError::NoResponse`]
//! 3. Validate the active entries, append them after the current roster and
//!    deduplicate. Seed entries keep their position; archivers that were not
//!    in the seed join at the tail
//! 4. Install the merged list as the live roster

use crate::client::FailoverClient;
use crate::error::DiscoveryError;
use crate::roster::sanitize;
use crate::types::{ActiveArchivers, Endpoint};
use tracing::{info, warn};

/// Endpoint serving the signed list of active archivers.
pub const ACTIVE_ARCHIVERS_ENDPOINT: &str = "archivers";

pub async fn resolve(
    seed: Vec<Endpoint>,
    client: &FailoverClient,
) -> Result<Vec<Endpoint>, DiscoveryError> {
    let roster = client.roster();
    roster.replace(seed);

    let Some(active) = client
        .get_signed::<ActiveArchivers>(ACTIVE_ARCHIVERS_ENDPOINT)
        .await
    else {
        warn!("No archivers responded when fetching current active archivers");
        return Err(DiscoveryError::NoResponse);
    };

    let (valid, rejected) = sanitize(&active.active_archivers);
    if !rejected.is_empty() {
        warn!(
            rejected = rejected.len(),
            signer = %active.sign.owner,
            "Active archiver list contained invalid entries"
        );
    }

    // The snapshot already reflects the promotion of the archiver that answered.
    let mut merged = roster.snapshot();
    let seed_len = merged.len();
    merged.extend(valid);
    roster.replace(merged);

    let resolved = roster.snapshot();
    info!(
        seed = seed_len,
        active = active.active_archivers.len(),
        roster = resolved.len(),
        "Resolved archiver roster"
    );
    Ok(resolved)
}
