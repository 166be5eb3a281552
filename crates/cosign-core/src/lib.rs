//! # Cosign Core - Foundation
//!
//! **Purpose**: Shared vocabulary of the registry co-signing service.
//!
//! - Identifiers (`QueryId`, `RegistryId`, `SignerId`)
//! - Feed entries, store records and the signed query chain
//! - Result lines and tallies for aggregation
//! - Unified `CosignError`
//! - Effect interfaces (`CryptoEffects`, `FeedEffects`, `PresentationEffects`,
//!   `RegistryVerifier`) with no implementations
//! - Node configuration
//!
//! Handlers live in `cosign-effects`; fakes live in `cosign-testkit`.

#![forbid(unsafe_code)]

/// Result lines, tallies and aggregation wire types
pub mod aggregate;

/// Base64 line framing for encrypted payloads
pub mod codec;

/// Node configuration
pub mod config;

/// Pure effect interfaces
pub mod effects;

/// Unified error handling
pub mod errors;

/// Query, registry and signer identifiers
pub mod identifiers;

/// Feed entries and store records
pub mod query;

/// Signed query documents
pub mod signed;

pub use aggregate::{AggregationRequest, ResultLine, Summary, Tally};
pub use config::{
    AggregationConfig, DistributionConfig, IdentityConfig, NodeConfig, PurgePolicy, WindowPolicy,
};
pub use effects::{
    CryptoEffects, CryptoEffectsExt, FeedEffects, PeerClaim, PresentationEffects, RecipientKey,
    RegistryVerifier,
};
pub use errors::{CosignError, Result};
pub use identifiers::{QueryId, RegistryId, SignerId};
pub use query::{
    canonical_json, FeedDocument, FeedQuery, QueryBatch, QueryRecord, RegistryRequest,
};
pub use signed::{Attestation, SignedQuery, VerifiedQuery};
