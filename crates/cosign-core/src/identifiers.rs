//! Identifier types used across the co-signing service
//!
//! All identifiers are opaque strings assigned outside this process: query ids
//! by the publishing front end, registry ids and signer ids by deployment
//! configuration.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_identifier!(
    /// Globally unique query identifier assigned by the publishing front end
    QueryId
);

string_identifier!(
    /// Identifier of a registry allowed to co-sign queries
    RegistryId
);

string_identifier!(
    /// Identifier of a signing key in the keyring
    ///
    /// Registries sign under their registry id; the query server signs baselines
    /// under its own configured id.
    SignerId
);

impl From<&RegistryId> for SignerId {
    fn from(registry: &RegistryId) -> Self {
        Self(registry.0.clone())
    }
}
