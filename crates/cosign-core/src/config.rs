//! Node configuration
//!
//! Loaded from a TOML file, then overridden by `COSIGN_*` environment
//! variables, then validated. Key material is kept as hex strings here and
//! decoded by the handlers that use it.

use crate::effects::RecipientKey;
use crate::identifiers::{RegistryId, SignerId};
use crate::{CosignError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "COSIGN_";

/// Registries recognized when no allow-list is configured
pub const DEFAULT_REGISTRIES: [&str; 3] = ["hunt", "cancer", "death"];

/// How signing windows are partitioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPolicy {
    /// Each registry has its own window
    #[default]
    PerRegistry,
    /// One window shared by all registries
    Exclusive,
}

/// What to do when upstream retires a query the store never held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PurgePolicy {
    /// Silently ignore
    #[default]
    Ignore,
    /// Log a warning
    Warn,
}

/// This node's own key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Id this node signs under
    pub signer_id: SignerId,
    /// Hex ed25519 signing key seed (32 bytes)
    pub signing_key: String,
    /// Hex X25519 private key (32 bytes) for frames addressed to this node
    pub decryption_key: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            signer_id: SignerId::from("query-server"),
            signing_key: String::new(),
            decryption_key: String::new(),
        }
    }
}

/// Query distribution server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Listen address
    pub bind: String,
    /// URL of the published query feed
    pub feed_url: String,
    /// Registries recognized by the allow-list verifier
    pub allowed_registries: Vec<RegistryId>,
    /// Hex encryption key per registry
    pub recipients: BTreeMap<RegistryId, String>,
    /// Window partitioning
    pub window_policy: WindowPolicy,
    /// How long a registry may hold its signing window
    pub window_timeout_secs: u64,
    /// How long to wait for the request line
    pub request_timeout_secs: u64,
    /// HTTP timeout for the feed pull
    pub feed_timeout_secs: u64,
    /// Handling of retirements for unknown ids
    pub purge_policy: PurgePolicy,
    /// Largest accepted frame
    pub max_frame_bytes: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9000".to_string(),
            feed_url: "http://127.0.0.1:8000/queries".to_string(),
            allowed_registries: DEFAULT_REGISTRIES.iter().map(|r| RegistryId::from(*r)).collect(),
            recipients: BTreeMap::new(),
            window_policy: WindowPolicy::default(),
            window_timeout_secs: 30,
            request_timeout_secs: 10,
            feed_timeout_secs: 10,
            purge_policy: PurgePolicy::default(),
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl DistributionConfig {
    /// Listen address as `host:port`
    pub fn bind_addr(&self) -> Result<&str> {
        host_port("distribution.bind", &self.bind)
    }

    /// Signing window timeout
    pub fn window_timeout(&self) -> Duration {
        Duration::from_secs(self.window_timeout_secs)
    }

    /// Request line timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Feed pull timeout
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// Encryption key for `registry`, or `ConfigMissing`
    pub fn recipient_for(&self, registry: &RegistryId) -> Result<RecipientKey> {
        match self.recipients.get(registry) {
            Some(encoded) if !encoded.trim().is_empty() => RecipientKey::from_hex(encoded),
            _ => Err(CosignError::config_missing(format!(
                "no encryption recipient for registry {registry}"
            ))),
        }
    }
}

/// Aggregation server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Listen address
    pub bind: String,
    /// Presentation endpoint receiving summaries
    pub presentation_addr: String,
    /// Hex encryption key of the presentation endpoint
    pub presentation_recipient: String,
    /// How long to wait for the request frame
    pub request_timeout_secs: u64,
    /// Connect/write timeout towards the presentation endpoint
    pub connect_timeout_secs: u64,
    /// Largest accepted frame
    pub max_frame_bytes: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9001".to_string(),
            presentation_addr: "127.0.0.1:9002".to_string(),
            presentation_recipient: String::new(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_frame_bytes: 64 * 1024 * 1024,
        }
    }
}

impl AggregationConfig {
    /// Listen address as `host:port`
    pub fn bind_addr(&self) -> Result<&str> {
        host_port("aggregation.bind", &self.bind)
    }

    /// Presentation endpoint as `host:port`, resolved at connect time
    pub fn presentation_endpoint(&self) -> Result<&str> {
        host_port("aggregation.presentation_addr", &self.presentation_addr)
    }

    /// Presentation encryption key, or `ConfigMissing`
    pub fn presentation_key(&self) -> Result<RecipientKey> {
        if self.presentation_recipient.trim().is_empty() {
            return Err(CosignError::config_missing(
                "aggregation.presentation_recipient is not set",
            ));
        }
        RecipientKey::from_hex(&self.presentation_recipient)
    }

    /// Request frame timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Outbound connect/write timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Own keys
    pub identity: IdentityConfig,
    /// Hex ed25519 verifying key per signer
    pub keyring: BTreeMap<SignerId, String>,
    /// Query distribution server
    pub distribution: DistributionConfig,
    /// Aggregation server
    pub aggregation: AggregationConfig,
}

impl NodeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CosignError::invalid(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CosignError::config_missing(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `COSIGN_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `COSIGN_*` overrides from an explicit variable list
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value: String = value.into();
            match name {
                "SIGNER_ID" => self.identity.signer_id = SignerId::from(value),
                "SIGNING_KEY" => self.identity.signing_key = value,
                "DECRYPTION_KEY" => self.identity.decryption_key = value,
                "DISTRIBUTION_BIND" => self.distribution.bind = value,
                "FEED_URL" => self.distribution.feed_url = value,
                "WINDOW_TIMEOUT_SECS" => {
                    self.distribution.window_timeout_secs = parse_secs(name, &value)?;
                }
                "ALLOWED_REGISTRIES" => {
                    self.distribution.allowed_registries = value
                        .split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(RegistryId::from)
                        .collect();
                }
                "AGGREGATION_BIND" => self.aggregation.bind = value,
                "PRESENTATION_ADDR" => self.aggregation.presentation_addr = value,
                "PRESENTATION_RECIPIENT" => self.aggregation.presentation_recipient = value,
                _ => tracing::debug!(variable = %key.as_ref(), "ignoring unknown override"),
            }
        }
        Ok(())
    }

    /// Validate addresses, timeouts and key encodings
    ///
    /// A registry on the allow-list without a recipient key is only a
    /// warning: that registry's requests fail with `ConfigMissing`.
    pub fn validate(&self) -> Result<()> {
        self.distribution.bind_addr()?;
        self.aggregation.bind_addr()?;
        self.aggregation.presentation_endpoint()?;

        if self.distribution.window_timeout_secs == 0 {
            return Err(CosignError::invalid("window_timeout_secs must be positive"));
        }
        if self.distribution.request_timeout_secs == 0
            || self.aggregation.request_timeout_secs == 0
        {
            return Err(CosignError::invalid("request_timeout_secs must be positive"));
        }

        for (field, value) in [
            ("identity.signing_key", &self.identity.signing_key),
            ("identity.decryption_key", &self.identity.decryption_key),
            (
                "aggregation.presentation_recipient",
                &self.aggregation.presentation_recipient,
            ),
        ] {
            if !value.is_empty() {
                decode_key32(field, value)?;
            }
        }
        for (signer, key) in &self.keyring {
            decode_key32(&format!("keyring.{signer}"), key)?;
        }
        for (registry, key) in &self.distribution.recipients {
            decode_key32(&format!("distribution.recipients.{registry}"), key)?;
        }

        for registry in &self.distribution.allowed_registries {
            if !self.distribution.recipients.contains_key(registry) {
                tracing::warn!(%registry, "allowed registry has no encryption recipient");
            }
        }
        Ok(())
    }
}

/// Decode a hex-encoded 32-byte key
pub fn decode_key32(field: &str, encoded: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| CosignError::invalid(format!("{field} is not hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| CosignError::invalid(format!("{field} must be 32 bytes")))
}

// Shape check only; names resolve when the socket is opened.
fn host_port<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    let invalid = |why: &str| CosignError::invalid(format!("{field} '{value}' {why}"));
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| invalid("is not host:port"))?;
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid("has no usable host"));
    }
    port.parse::<u16>()
        .map_err(|e| invalid(&format!("has a bad port: {e}")))?;
    Ok(value)
}

fn parse_secs(field: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| CosignError::invalid(format!("{field} '{value}' is not a number: {e}")))
}
