//! Archiver discovery client library
//!
//! Bootstraps a process into the set of archivers: merges the candidate
//! sources (environment, config file, remote seed list) into a seed roster,
//! resolves it against the archivers' signed list of active archivers, and
//! queries the roster with failover and liveness-based reordering.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod roster;
pub mod sources;
pub mod types;

pub use client::{FailoverClient, RequestOptions};
pub use config::{ArchiverConfig, DiscoveryConfig};
pub use crypto::{Ed25519Verifier, PayloadVerifier, SignatureError, sign_payload};
pub use discovery::{
    CandidateSets, Discovery, archiver_list, candidate_sets, get_from_archiver,
    get_from_archiver_with, get_signed_from_archiver, get_signed_from_archiver_with, setup,
};
pub use error::{DiscoveryError, ValidationError};
pub use roster::{LiveRoster, Rejection, build_roster, dedup_by_public_key, validate_candidate};
pub use types::{ActiveArchivers, CandidateEndpoint, Endpoint, Sign};
