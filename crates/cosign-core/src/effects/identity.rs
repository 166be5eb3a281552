//! Registry identity verification
//!
//! Recognizing the registry is the first step of every distribution request and
//! happens before any feed or store access. The shipped verifier is an
//! allow-list over the claimed `source_id`; stronger schemes (mutual TLS,
//! signed requests) plug in behind the same trait.

use crate::identifiers::RegistryId;
use crate::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

/// What the handler knows about the connecting peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerClaim {
    /// Identifier from the request line
    pub source_id: RegistryId,
    /// Remote socket address, when the transport has one
    pub peer_addr: Option<SocketAddr>,
}

/// Decides whether a peer is a recognized registry
#[async_trait]
pub trait RegistryVerifier: Send + Sync {
    /// Return the authenticated registry id or `UnknownRegistry`
    async fn verify_registry(&self, claim: &PeerClaim) -> Result<RegistryId>;
}
