//! # Cosign Effects - Production Handlers
//!
//! Stateless implementations of the effect traits defined in `cosign-core`:
//!
//! - [`RealCryptoHandler`]: ed25519 signatures, HPKE encryption
//! - [`HttpFeedHandler`]: pulls the query feed over HTTP
//! - [`TcpPresentationHandler`]: pushes summaries over TCP
//! - [`AllowListVerifier`]: recognizes registries by configured id
//! - [`LineTransport`]: bounded newline-delimited framing used by all servers

#![forbid(unsafe_code)]

pub mod crypto;
pub mod feed;
pub mod identity;
pub mod presentation;
pub mod transport;

pub use crypto::{generate_identity, GeneratedIdentity, RealCryptoHandler};
pub use feed::{parse_feed, HttpFeedHandler};
pub use identity::AllowListVerifier;
pub use presentation::TcpPresentationHandler;
pub use transport::LineTransport;
