//! Deterministic crypto fake
//!
//! Signatures are `sha256(signer || 0 || message)`, so any handler can check
//! any other handler's signatures without a keyring. Encryption is a plain
//! envelope addressed to a signer id; only the handler with that id opens it.
//! Neither offers any secrecy.

use async_trait::async_trait;
use cosign_core::effects::{CryptoEffects, RecipientKey};
use cosign_core::{CosignError, Result, SignerId};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

const ENVELOPE_TAG: &[u8] = b"mock-envelope:";

/// Mock crypto handler for one party
#[derive(Debug, Clone)]
pub struct MockCryptoHandler {
    signer_id: SignerId,
    // empty means every signer is trusted
    trusted: Arc<RwLock<BTreeSet<SignerId>>>,
}

impl MockCryptoHandler {
    /// Handler signing as `signer_id`, trusting everyone
    pub fn new(signer_id: impl Into<SignerId>) -> Self {
        Self {
            signer_id: signer_id.into(),
            trusted: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    /// Restrict verification to the listed signers
    pub fn trusting(self, signers: impl IntoIterator<Item = impl Into<SignerId>>) -> Self {
        self.trusted
            .write()
            .extend(signers.into_iter().map(Into::into));
        self
    }

    /// Key other parties encrypt to when addressing this handler
    pub fn recipient_key(&self) -> RecipientKey {
        recipient_key_for(self.signer_id.as_str())
    }

    fn is_trusted(&self, signer: &SignerId) -> bool {
        let trusted = self.trusted.read();
        trusted.is_empty() || trusted.contains(signer)
    }
}

/// Recipient key addressing the mock handler named `signer`
pub fn recipient_key_for(signer: &str) -> RecipientKey {
    RecipientKey(signer.as_bytes().to_vec())
}

/// [`recipient_key_for`] in the hex form configuration files use
pub fn recipient_hex_for(signer: &str) -> String {
    hex::encode(signer)
}

fn fake_signature(signer: &SignerId, message: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(signer.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(message);
    hasher.finalize().to_vec()
}

#[async_trait]
impl CryptoEffects for MockCryptoHandler {
    fn signer_id(&self) -> &SignerId {
        &self.signer_id
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(fake_signature(&self.signer_id, message))
    }

    async fn verify(&self, signer: &SignerId, message: &[u8], signature: &[u8]) -> Result<bool> {
        Ok(self.is_trusted(signer) && fake_signature(signer, message) == signature)
    }

    async fn encrypt(&self, plaintext: &[u8], recipient: &RecipientKey) -> Result<Vec<u8>> {
        let addressee = recipient.as_bytes();
        let len = u8::try_from(addressee.len())
            .map_err(|_| CosignError::crypto("mock recipient id too long"))?;
        let mut out = Vec::with_capacity(ENVELOPE_TAG.len() + 1 + addressee.len() + plaintext.len());
        out.extend_from_slice(ENVELOPE_TAG);
        out.push(len);
        out.extend_from_slice(addressee);
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let rest = ciphertext
            .strip_prefix(ENVELOPE_TAG)
            .ok_or_else(|| CosignError::decryption("not a mock envelope"))?;
        let (&len, rest) = rest
            .split_first()
            .ok_or_else(|| CosignError::decryption("truncated envelope"))?;
        let len = usize::from(len);
        if rest.len() < len {
            return Err(CosignError::decryption("truncated envelope"));
        }
        let (addressee, body) = rest.split_at(len);
        if addressee != self.signer_id.as_str().as_bytes() {
            return Err(CosignError::decryption("envelope addressed to another party"));
        }
        Ok(body.to_vec())
    }
}
