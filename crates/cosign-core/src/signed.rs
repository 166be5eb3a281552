//! Signed query documents and the co-signing chain
//!
//! A [`SignedQuery`] carries the canonical text of a query's fields and an
//! ordered list of attestations. Attestation `n` signs the content together
//! with attestations `0..n`, so every co-signer commits to everything signed
//! before it. The query server's baseline is attestation 0.

use crate::identifiers::SignerId;
use crate::query::canonical_json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One signer's contribution to the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Keyring entry that verifies this signature
    pub signer: SignerId,
    /// Base64 signature over the chain prefix
    pub signature: String,
}

/// Canonical signed representation of a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedQuery {
    /// Canonical JSON of the query fields
    pub content: String,
    /// Attestations in signing order
    #[serde(default)]
    pub signatures: Vec<Attestation>,
}

impl SignedQuery {
    /// Unsigned document over `fields`
    pub fn unsigned(fields: &Value) -> Self {
        Self {
            content: canonical_json(fields),
            signatures: Vec::new(),
        }
    }

    /// Bytes covered by the attestation at position `depth`
    ///
    /// Encoded as JSON `[content, [attestations before depth]]` so the input
    /// is unambiguous whatever the content holds.
    pub fn signing_input(&self, depth: usize) -> Vec<u8> {
        let prefix = &self.signatures[..depth.min(self.signatures.len())];
        serde_json::json!([self.content, prefix])
            .to_string()
            .into_bytes()
    }

    /// Bytes the next co-signer must sign
    pub fn next_signing_input(&self) -> Vec<u8> {
        self.signing_input(self.signatures.len())
    }

    /// Append an attestation
    pub fn with_attestation(mut self, attestation: Attestation) -> Self {
        self.signatures.push(attestation);
        self
    }

    /// Most recent signer, if any
    pub fn latest_signer(&self) -> Option<&SignerId> {
        self.signatures.last().map(|a| &a.signer)
    }

    /// Whether this document signs exactly `fields`
    pub fn covers(&self, fields: &Value) -> bool {
        self.content == canonical_json(fields)
    }

    /// Whether this document is `base` plus exactly one more attestation
    pub fn extends(&self, base: &SignedQuery) -> bool {
        self.content == base.content
            && self.signatures.len() == base.signatures.len() + 1
            && self.signatures[..base.signatures.len()] == base.signatures[..]
    }
}

/// A signed document whose whole chain passed verification
///
/// Only [`crate::effects::CryptoEffectsExt::verify_query`] constructs this,
/// so store merges can only ever see verified signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedQuery(SignedQuery);

impl VerifiedQuery {
    pub(crate) fn new(inner: SignedQuery) -> Self {
        Self(inner)
    }

    /// Borrow the verified document
    pub fn document(&self) -> &SignedQuery {
        &self.0
    }

    /// Take the verified document
    pub fn into_inner(self) -> SignedQuery {
        self.0
    }
}
