//! # Cosign Store
//!
//! Process-wide signing state: the [`QueryStore`] that holds every live query
//! and its accumulated signature chain, and the [`SigningWindows`] that keep a
//! registry's batch consistent with the chain it is asked to extend.

#![forbid(unsafe_code)]

pub mod store;
pub mod windows;

pub use store::{MergeReport, QueryStore, RefreshSummary, UpsertOutcome};
pub use windows::{SigningWindows, WindowLease};
