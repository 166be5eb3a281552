//! Pure effect interfaces (no implementations)
//!
//! - `CryptoEffects`: sign, verify, encrypt, decrypt
//! - `FeedEffects`: pull the published query list
//! - `PresentationEffects`: push encrypted summaries downstream
//! - `RegistryVerifier`: recognize the requesting registry

pub mod crypto;
pub mod feed;
pub mod identity;
pub mod presentation;

pub use crypto::{CryptoEffects, CryptoEffectsExt, RecipientKey};
pub use feed::FeedEffects;
pub use identity::{PeerClaim, RegistryVerifier};
pub use presentation::PresentationEffects;
