//! Configuration management for Formgate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{FormgateError, Result};

/// Prefix for environment variable overrides, e.g.
/// `FORMGATE__POLICIES__CONTACT__WINDOW_MS=60000`.
pub const ENV_PREFIX: &str = "FORMGATE";

/// Main configuration for Formgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormgateConfig {
    /// Rate limit policies
    #[serde(default)]
    pub policies: PoliciesConfig,

    /// Background expiry sweeper
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The named limiter policies shared by request handlers.
///
/// A policy section may set only some of its fields; the rest come from that
/// policy's own defaults, not from a shared generic default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PolicyOverrides")]
pub struct PoliciesConfig {
    /// Policy for the public contact/intake form
    pub contact: PolicyConfig,

    /// Stricter policy for sensitive endpoints
    pub strict: PolicyConfig,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            contact: default_contact_policy(),
            strict: default_strict_policy(),
        }
    }
}

fn default_contact_policy() -> PolicyConfig {
    PolicyConfig {
        window_ms: 60 * 60 * 1000,
        max_tracked_identifiers: 500,
    }
}

fn default_strict_policy() -> PolicyConfig {
    PolicyConfig {
        window_ms: 24 * 60 * 60 * 1000,
        max_tracked_identifiers: 100,
    }
}

/// The `policies` section as written, before per-policy defaults are applied.
#[derive(Debug, Default, Deserialize)]
struct PolicyOverrides {
    #[serde(default)]
    contact: PartialPolicy,
    #[serde(default)]
    strict: PartialPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPolicy {
    window_ms: Option<u64>,
    max_tracked_identifiers: Option<usize>,
}

impl PartialPolicy {
    fn or(self, defaults: PolicyConfig) -> PolicyConfig {
        PolicyConfig {
            window_ms: self.window_ms.unwrap_or(defaults.window_ms),
            max_tracked_identifiers: self
                .max_tracked_identifiers
                .unwrap_or(defaults.max_tracked_identifiers),
        }
    }
}

impl From<PolicyOverrides> for PoliciesConfig {
    fn from(overrides: PolicyOverrides) -> Self {
        Self {
            contact: overrides.contact.or(default_contact_policy()),
            strict: overrides.strict.or(default_strict_policy()),
        }
    }
}

/// Configuration for a single rate limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Fixed window size in milliseconds
    pub window_ms: u64,

    /// Maximum identifier/window buckets held in memory
    pub max_tracked_identifiers: usize,
}

impl PolicyConfig {
    /// Check that the policy can back a limiter.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.window_ms == 0 {
            return Err(FormgateError::Config(format!(
                "policy '{}': window_ms must be greater than zero",
                name
            )));
        }
        if self.max_tracked_identifiers == 0 {
            return Err(FormgateError::Config(format!(
                "policy '{}': max_tracked_identifiers must be greater than zero",
                name
            )));
        }
        Ok(())
    }
}

/// Background sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether to run the sweeper at all
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// One of `pretty`, `compact` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl FormgateConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FormgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FormgateError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional YAML file with `FORMGATE__*`
    /// environment variables layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: FormgateConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.policies.contact.validate("contact")?;
        self.policies.strict.validate("strict")?;

        if self.sweeper.enabled && self.sweeper.interval_secs == 0 {
            return Err(FormgateError::Config(
                "sweeper.interval_secs must be greater than zero".to_string(),
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => Ok(()),
            other => Err(FormgateError::Config(format!(
                "unknown logging.format '{}'",
                other
            ))),
        }
    }
}
