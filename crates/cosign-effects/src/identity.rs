//! Allow-list registry verifier
//!
//! Recognizes a registry by the `source_id` it claims. This is membership in
//! a configured set, not authentication; deployments needing more should
//! provide their own `RegistryVerifier`.

use async_trait::async_trait;
use cosign_core::effects::{PeerClaim, RegistryVerifier};
use cosign_core::{CosignError, DistributionConfig, RegistryId, Result};
use std::collections::BTreeSet;

/// Verifier backed by a fixed set of registry ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListVerifier {
    allowed: BTreeSet<RegistryId>,
}

impl AllowListVerifier {
    /// Create from any list of ids
    pub fn new(allowed: impl IntoIterator<Item = impl Into<RegistryId>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Create from `[distribution] allowed_registries`
    pub fn from_config(config: &DistributionConfig) -> Self {
        Self::new(config.allowed_registries.iter().cloned())
    }

    /// Whether `registry` is on the list
    pub fn allows(&self, registry: &RegistryId) -> bool {
        self.allowed.contains(registry)
    }
}

#[async_trait]
impl RegistryVerifier for AllowListVerifier {
    async fn verify_registry(&self, claim: &PeerClaim) -> Result<RegistryId> {
        if self.allows(&claim.source_id) {
            Ok(claim.source_id.clone())
        } else {
            Err(CosignError::unknown_registry(claim.source_id.as_str()))
        }
    }
}
