//! Negotiation policy configuration.
//!
//! The policy knobs live in an optional YAML file (see `trueque.yaml` at the
//! workspace root). Every field has a default, so an empty file or no file
//! at all yields the standard policy.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Tunable parameters of the bargaining policy and the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NegotiationConfig {
    /// Name of the scarce resource, never advertised and sent only as a
    /// last resort.
    #[serde(default = "default_scarce_resource")]
    pub scarce_resource: String,

    /// One queued micro-offer is sent per this many processed letters.
    #[serde(default = "default_offers_every_n_letters")]
    pub offers_every_n_letters: u32,

    /// Units given and asked for in each micro-offer.
    #[serde(default = "default_micro_offer_quantity")]
    pub micro_offer_quantity: u32,

    /// Sleep between polls when the mailbox is empty, in milliseconds.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Optional cap on how many peers receive status letters and offers.
    #[serde(default)]
    pub max_peers: Option<usize>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            scarce_resource: default_scarce_resource(),
            offers_every_n_letters: default_offers_every_n_letters(),
            micro_offer_quantity: default_micro_offer_quantity(),
            idle_backoff_ms: default_idle_backoff_ms(),
            max_peers: None,
        }
    }
}

impl NegotiationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scarce_resource.trim().is_empty() {
            return Err(ConfigError::Invalid("scarce_resource must not be empty".to_owned()));
        }
        if self.offers_every_n_letters == 0 {
            return Err(ConfigError::Invalid(
                "offers_every_n_letters must be at least 1".to_owned(),
            ));
        }
        if self.micro_offer_quantity == 0 {
            return Err(ConfigError::Invalid(
                "micro_offer_quantity must be at least 1".to_owned(),
            ));
        }
        if self.max_peers == Some(0) {
            return Err(ConfigError::Invalid("max_peers must be at least 1 when set".to_owned()));
        }
        Ok(())
    }

    /// Idle backoff as a [`Duration`].
    pub const fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

fn default_scarce_resource() -> String {
    "oro".to_owned()
}

const fn default_offers_every_n_letters() -> u32 {
    3
}

const fn default_micro_offer_quantity() -> u32 {
    1
}

const fn default_idle_backoff_ms() -> u64 {
    5000
}
