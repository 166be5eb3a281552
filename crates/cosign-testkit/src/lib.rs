//! # Cosign Testkit
//!
//! Deterministic fakes for every effect interface plus fixtures and proptest
//! strategies:
//!
//! - [`MockCryptoHandler`]: keyless signatures and addressed envelopes
//! - [`MemoryFeed`], [`MemorySink`]: in-memory feed and presentation endpoint
//! - [`RegistryClient`]: the registry side of the distribution exchange
//!
//! ```toml
//! [dev-dependencies]
//! cosign-testkit = { path = "../cosign-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod crypto;
pub mod effects;
pub mod fixtures;
pub mod registry;
pub mod strategies;

pub use crypto::{recipient_hex_for, recipient_key_for, MockCryptoHandler};
pub use effects::{MemoryFeed, MemorySink};
pub use fixtures::*;
pub use registry::{RegistryClient, RegistrySession, SignedReply};
