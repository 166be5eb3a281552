//! Cryptographic effects trait definitions
//!
//! The service treats signing and encryption as an opaque capability. Handlers
//! live in `cosign-effects` (production) and `cosign-testkit` (deterministic
//! fake); domain code only ever sees [`CryptoEffects`].

use crate::codec::{decode_frame, encode_frame};
use crate::identifiers::SignerId;
use crate::signed::{Attestation, SignedQuery, VerifiedQuery};
use crate::{CosignError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Public encryption key of a frame recipient, in handler-specific encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientKey(pub Vec<u8>);

impl RecipientKey {
    /// Decode from hex
    pub fn from_hex(encoded: &str) -> Result<Self> {
        hex::decode(encoded.trim())
            .map(Self)
            .map_err(|e| CosignError::invalid(format!("recipient key is not hex: {e}")))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Core cryptographic effects interface
///
/// One handler instance holds one party's identity: its signing key, its
/// decryption key and the keyring used to verify everyone else.
#[async_trait]
pub trait CryptoEffects: Send + Sync {
    /// Identity this handler signs under
    fn signer_id(&self) -> &SignerId;

    /// Sign raw bytes with this party's key
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature by `signer` over `message`
    ///
    /// Returns `Ok(false)` for a bad signature or an unknown signer; errors
    /// are reserved for malformed inputs.
    async fn verify(&self, signer: &SignerId, message: &[u8], signature: &[u8]) -> Result<bool>;

    /// Encrypt bytes for the holder of `recipient`
    async fn encrypt(&self, plaintext: &[u8], recipient: &RecipientKey) -> Result<Vec<u8>>;

    /// Decrypt bytes addressed to this party
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Signed-document and framing operations derived from [`CryptoEffects`]
#[async_trait]
pub trait CryptoEffectsExt: CryptoEffects {
    /// Append this party's attestation to `doc`
    async fn attest(&self, doc: SignedQuery) -> Result<SignedQuery> {
        let signature = self.sign(&doc.next_signing_input()).await?;
        let attestation = Attestation {
            signer: self.signer_id().clone(),
            signature: STANDARD.encode(signature),
        };
        Ok(doc.with_attestation(attestation))
    }

    /// Verify every attestation of `doc`
    async fn verify_chain(&self, doc: &SignedQuery) -> Result<bool> {
        if doc.signatures.is_empty() {
            return Ok(false);
        }
        for (depth, attestation) in doc.signatures.iter().enumerate() {
            let signature = match STANDARD.decode(&attestation.signature) {
                Ok(bytes) => bytes,
                Err(_) => return Ok(false),
            };
            let ok = self
                .verify(&attestation.signer, &doc.signing_input(depth), &signature)
                .await?;
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Verify `doc` for `query_id`, producing a [`VerifiedQuery`]
    async fn verify_query(&self, query_id: &str, doc: SignedQuery) -> Result<VerifiedQuery> {
        if self.verify_chain(&doc).await? {
            Ok(VerifiedQuery::new(doc))
        } else {
            Err(CosignError::signature_invalid(
                query_id,
                "signature chain did not verify",
            ))
        }
    }

    /// Serialize `value`, encrypt it for `recipient` and encode it as one frame
    async fn seal_json<T>(&self, value: &T, recipient: &RecipientKey) -> Result<String>
    where
        T: Serialize + Sync,
    {
        let plaintext = serde_json::to_vec(value)?;
        let ciphertext = self.encrypt(&plaintext, recipient).await?;
        Ok(encode_frame(&ciphertext))
    }

    /// Decode one frame, decrypt it and deserialize the plaintext
    ///
    /// Any failure is reported as `DecryptionFailure`.
    async fn open_json<T>(&self, frame: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let ciphertext = decode_frame(frame)?;
        let plaintext = self
            .decrypt(&ciphertext)
            .await
            .map_err(|e| CosignError::decryption(e.to_string()))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CosignError::decryption(format!("plaintext is not valid JSON: {e}")))
    }
}

impl<T: CryptoEffects + ?Sized> CryptoEffectsExt for T {}
