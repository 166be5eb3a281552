//! Unified error system for the co-signing service
//!
//! Every failure in the service is request-scoped: a handler returns one of
//! these, logs it and closes its connection. Nothing here is fatal to the
//! process or to the shared store.

use serde::{Deserialize, Serialize};

/// Unified error type for all co-signing operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CosignError {
    /// Required configuration is absent (e.g. no recipient key for a registry)
    #[error("Missing configuration: {message}")]
    ConfigMissing {
        /// What was missing
        message: String,
    },

    /// The requesting registry is not recognized
    #[error("Unknown registry: {source_id}")]
    UnknownRegistry {
        /// The identifier presented by the peer
        source_id: String,
    },

    /// A returned signature failed verification
    #[error("Signature invalid for query {query_id}: {message}")]
    SignatureInvalid {
        /// Query whose signature was rejected
        query_id: String,
        /// Why verification failed
        message: String,
    },

    /// A merge targeted a query that is not in the store
    #[error("Unknown query: {query_id}")]
    UnknownQuery {
        /// The absent query identifier
        query_id: String,
    },

    /// A returned chain does not extend the record's current chain
    #[error("Stale signature for query {query_id}")]
    StaleSignature {
        /// Query whose chain moved on
        query_id: String,
    },

    /// The registry already contributed a signature to this query
    #[error("Query {query_id} already signed by {registry}")]
    AlreadySigned {
        /// Query identifier
        query_id: String,
        /// Registry that tried to sign twice
        registry: String,
    },

    /// Malformed or wrong-key encrypted payload
    #[error("Decryption failure: {message}")]
    DecryptionFailure {
        /// Error message describing the failure
        message: String,
    },

    /// The signing window could not be acquired in time
    #[error("Signing window busy for {registry}")]
    WindowBusy {
        /// Registry waiting on the window
        registry: String,
    },

    /// An I/O deadline passed
    #[error("Timed out: {message}")]
    Timeout {
        /// Operation that timed out
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Network or transport error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Upstream query feed could not be fetched or parsed
    #[error("Feed error: {message}")]
    Feed {
        /// Error message describing the feed failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl CosignError {
    /// Create a missing configuration error
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::ConfigMissing {
            message: message.into(),
        }
    }

    /// Create an unknown registry error
    pub fn unknown_registry(source_id: impl Into<String>) -> Self {
        Self::UnknownRegistry {
            source_id: source_id.into(),
        }
    }

    /// Create a signature invalid error
    pub fn signature_invalid(query_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            query_id: query_id.into(),
            message: message.into(),
        }
    }

    /// Create an unknown query error
    pub fn unknown_query(query_id: impl Into<String>) -> Self {
        Self::UnknownQuery {
            query_id: query_id.into(),
        }
    }

    /// Create a stale signature error
    pub fn stale_signature(query_id: impl Into<String>) -> Self {
        Self::StaleSignature {
            query_id: query_id.into(),
        }
    }

    /// Create an already signed error
    pub fn already_signed(query_id: impl Into<String>, registry: impl Into<String>) -> Self {
        Self::AlreadySigned {
            query_id: query_id.into(),
            registry: registry.into(),
        }
    }

    /// Create a decryption failure
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::DecryptionFailure {
            message: message.into(),
        }
    }

    /// Create a window busy error
    pub fn window_busy(registry: impl Into<String>) -> Self {
        Self::WindowBusy {
            registry: registry.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a feed error
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error rejects a single merge entry rather than the batch
    pub fn is_entry_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownQuery { .. }
                | Self::StaleSignature { .. }
                | Self::AlreadySigned { .. }
                | Self::SignatureInvalid { .. }
        )
    }
}

/// Standard Result type for co-signing operations
pub type Result<T> = std::result::Result<T, CosignError>;

impl From<std::io::Error> for CosignError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
            std::io::ErrorKind::InvalidData => Self::invalid(err.to_string()),
            _ => Self::network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CosignError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
