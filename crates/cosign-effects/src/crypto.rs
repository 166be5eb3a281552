//! Real cryptographic handler
//!
//! - Signatures: ed25519, verified against a keyring of signer id → verifying key.
//! - Encryption: HPKE base mode, X25519-HKDF-SHA256 with ChaCha20-Poly1305.
//!   The ciphertext is the 32-byte encapsulated key followed by the sealed body.

use async_trait::async_trait;
use cosign_core::config::decode_key32;
use cosign_core::effects::{CryptoEffects, RecipientKey};
use cosign_core::{CosignError, NodeConfig, Result, SignerId};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use hpke::aead::ChaCha20Poly1305;
use hpke::kdf::HkdfSha256;
use hpke::kem::X25519HkdfSha256;
use hpke::{Deserializable, Kem as KemTrait, OpModeR, OpModeS, Serializable};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

type HpkeKem = X25519HkdfSha256;
type HpkeKdf = HkdfSha256;
type HpkeAead = ChaCha20Poly1305;

type DecryptionKey = <HpkeKem as KemTrait>::PrivateKey;
type EncryptionKey = <HpkeKem as KemTrait>::PublicKey;

/// Length of a serialized X25519 encapsulated key
const ENCAPPED_KEY_LEN: usize = 32;

/// HPKE info string binding ciphertexts to this protocol
const HPKE_INFO: &[u8] = b"cosign-frame-v1";

/// Production crypto handler holding one party's keys
pub struct RealCryptoHandler {
    signer_id: SignerId,
    signing_key: Option<SigningKey>,
    decryption_key: Option<DecryptionKey>,
    keyring: HashMap<SignerId, VerifyingKey>,
}

impl fmt::Debug for RealCryptoHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealCryptoHandler")
            .field("signer_id", &self.signer_id)
            .field("can_sign", &self.signing_key.is_some())
            .field("can_decrypt", &self.decryption_key.is_some())
            .field("keyring", &self.keyring.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RealCryptoHandler {
    /// Create a handler with no keys; add them with the `with_*` builders
    pub fn new(signer_id: SignerId) -> Self {
        Self {
            signer_id,
            signing_key: None,
            decryption_key: None,
            keyring: HashMap::new(),
        }
    }

    /// Build from the `[identity]` and `[keyring]` configuration sections
    ///
    /// The handler always trusts its own verifying key.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let identity = &config.identity;
        let mut handler = Self::new(identity.signer_id.clone());

        if !identity.signing_key.is_empty() {
            let seed = Zeroizing::new(decode_key32("identity.signing_key", &identity.signing_key)?);
            handler = handler.with_signing_key(SigningKey::from_bytes(&seed));
        }
        if !identity.decryption_key.is_empty() {
            let secret = Zeroizing::new(decode_key32(
                "identity.decryption_key",
                &identity.decryption_key,
            )?);
            handler = handler.with_decryption_key(&secret[..])?;
        }
        for (signer, encoded) in &config.keyring {
            let bytes = decode_key32(&format!("keyring.{signer}"), encoded)?;
            let key = VerifyingKey::from_bytes(&bytes)
                .map_err(|e| CosignError::invalid(format!("keyring.{signer}: {e}")))?;
            handler = handler.with_trusted_key(signer.clone(), key);
        }
        Ok(handler)
    }

    /// Set the signing key and trust its verifying half under our own id
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.keyring
            .insert(self.signer_id.clone(), key.verifying_key());
        self.signing_key = Some(key);
        self
    }

    /// Set the X25519 private key for inbound frames
    pub fn with_decryption_key(mut self, secret: &[u8]) -> Result<Self> {
        let key = DecryptionKey::from_bytes(secret)
            .map_err(|e| CosignError::invalid(format!("invalid decryption key: {e:?}")))?;
        self.decryption_key = Some(key);
        Ok(self)
    }

    /// Trust `key` for signatures by `signer`
    pub fn with_trusted_key(mut self, signer: SignerId, key: VerifyingKey) -> Self {
        self.keyring.insert(signer, key);
        self
    }

    /// Public encryption key matching our decryption key
    pub fn recipient_key(&self) -> Option<RecipientKey> {
        self.decryption_key
            .as_ref()
            .map(|sk| RecipientKey(HpkeKem::sk_to_pk(sk).to_bytes().to_vec()))
    }
}

#[async_trait]
impl CryptoEffects for RealCryptoHandler {
    fn signer_id(&self) -> &SignerId {
        &self.signer_id
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let key = self.signing_key.as_ref().ok_or_else(|| {
            CosignError::config_missing(format!("{} has no signing key", self.signer_id))
        })?;
        Ok(key.sign(message).to_bytes().to_vec())
    }

    async fn verify(&self, signer: &SignerId, message: &[u8], signature: &[u8]) -> Result<bool> {
        let Some(key) = self.keyring.get(signer) else {
            tracing::debug!(%signer, "signature by signer outside the keyring");
            return Ok(false);
        };
        let signature = match Signature::from_slice(signature) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        Ok(key.verify_strict(message, &signature).is_ok())
    }

    async fn encrypt(&self, plaintext: &[u8], recipient: &RecipientKey) -> Result<Vec<u8>> {
        let recipient_pk = EncryptionKey::from_bytes(recipient.as_bytes())
            .map_err(|e| CosignError::crypto(format!("invalid recipient key: {e:?}")))?;

        let mut rng = rand::thread_rng();
        let (encapped_key, ciphertext) = hpke::single_shot_seal::<HpkeAead, HpkeKdf, HpkeKem, _>(
            &OpModeS::Base,
            &recipient_pk,
            HPKE_INFO,
            plaintext,
            b"",
            &mut rng,
        )
        .map_err(|e| CosignError::crypto(format!("HPKE seal failed: {e:?}")))?;

        let mut sealed = Vec::with_capacity(ENCAPPED_KEY_LEN + ciphertext.len());
        sealed.extend_from_slice(&encapped_key.to_bytes());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.decryption_key.as_ref().ok_or_else(|| {
            CosignError::config_missing(format!("{} has no decryption key", self.signer_id))
        })?;
        if ciphertext.len() < ENCAPPED_KEY_LEN {
            return Err(CosignError::decryption(
                "ciphertext too short to hold an encapsulated key",
            ));
        }

        let (encapped_bytes, body) = ciphertext.split_at(ENCAPPED_KEY_LEN);
        let encapped_key = <HpkeKem as KemTrait>::EncappedKey::from_bytes(encapped_bytes)
            .map_err(|e| CosignError::decryption(format!("invalid encapsulated key: {e:?}")))?;

        hpke::single_shot_open::<HpkeAead, HpkeKdf, HpkeKem>(
            &OpModeR::Base,
            key,
            &encapped_key,
            HPKE_INFO,
            body,
            b"",
        )
        .map_err(|e| CosignError::decryption(format!("HPKE open failed: {e:?}")))
    }
}

/// Freshly generated key material for one party, hex encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedIdentity {
    /// ed25519 signing key seed; goes into `[identity] signing_key`
    pub signing_key: String,
    /// ed25519 verifying key; goes into other parties' `[keyring]`
    pub verifying_key: String,
    /// X25519 private key; goes into `[identity] decryption_key`
    pub decryption_key: String,
    /// X25519 public key; goes into other parties' recipient tables
    pub recipient_key: String,
}

/// Generate signing and encryption keys for one party
pub fn generate_identity() -> GeneratedIdentity {
    let mut rng = rand::thread_rng();
    let signing_key = SigningKey::generate(&mut rng);
    let (decryption_key, recipient_key) = HpkeKem::gen_keypair(&mut rng);

    GeneratedIdentity {
        signing_key: hex::encode(signing_key.to_bytes()),
        verifying_key: hex::encode(signing_key.verifying_key().to_bytes()),
        decryption_key: hex::encode(decryption_key.to_bytes()),
        recipient_key: hex::encode(recipient_key.to_bytes()),
    }
}
