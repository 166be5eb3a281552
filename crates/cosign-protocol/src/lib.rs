//! # Cosign Protocol
//!
//! The two network exchanges of a cosign node, written against the effect
//! traits so they run unchanged over TCP or in-memory streams:
//!
//! - [`DistributionHandler`]: offers queries to a registry and merges its
//!   co-signatures
//! - [`AggregationHandler`]: tallies encrypted result lines and forwards the
//!   summary to the presentation endpoint
//! - [`server`]: accept loops spawning one task per connection

#![forbid(unsafe_code)]

pub mod aggregation;
pub mod distribution;
pub mod server;

pub use aggregation::{summarize, AggregationHandler};
pub use distribution::{DistributionHandler, DistributionOutcome};
pub use server::{bind_and_serve, resolve_bind, serve, ConnectionHandler};
