//! Cache configuration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use validator::{Validate, ValidationError};

/// Environment variable overriding [`CacheConfig::cache_name`].
pub const ENV_CACHE_NAME: &str = "RESILIENT_CACHE_NAME";
/// Environment variable overriding [`CacheConfig::instance_prefix`].
pub const ENV_INSTANCE_PREFIX: &str = "RESILIENT_CACHE_INSTANCE_PREFIX";
/// Environment variable overriding [`CacheConfig::schema_version`].
pub const ENV_SCHEMA_VERSION: &str = "RESILIENT_CACHE_SCHEMA_VERSION";
/// Environment variable overriding [`CacheConfig::endpoints`] (`host:port,host:port`).
pub const ENV_ENDPOINTS: &str = "RESILIENT_CACHE_ENDPOINTS";
/// Environment variable overriding [`CacheConfig::connect_on_startup`].
pub const ENV_CONNECT_ON_STARTUP: &str = "RESILIENT_CACHE_CONNECT_ON_STARTUP";

/// A cache host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndpointConfig {
    /// Host name or address.
    #[validate(length(min = 1))]
    pub host: String,

    /// Port of the cache service.
    #[validate(range(min = 1))]
    pub port: u16,
}

impl EndpointConfig {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for EndpointConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{s}'"))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in '{s}': {e}"))?;
        Ok(Self::new(host, port))
    }
}

/// Keep-alive probing of an unavailable backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AvailabilitySettings {
    /// Minimum interval between two keep-alive probes.
    #[serde(with = "humantime_serde", default = "default_probe_cooldown")]
    pub probe_cooldown: Duration,

    /// Longest wait for the first probe after start-up.
    #[serde(with = "humantime_serde", default = "default_first_probe_wait")]
    pub first_probe_wait: Duration,

    /// Poll step while waiting for the first probe.
    #[serde(with = "humantime_serde", default = "default_first_probe_poll_interval")]
    #[validate(custom(function = "non_zero_duration"))]
    pub first_probe_poll_interval: Duration,
}

fn default_probe_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_first_probe_wait() -> Duration {
    Duration::from_millis(2500)
}

fn default_first_probe_poll_interval() -> Duration {
    Duration::from_millis(250)
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        Self {
            probe_cooldown: default_probe_cooldown(),
            first_probe_wait: default_first_probe_wait(),
            first_probe_poll_interval: default_first_probe_poll_interval(),
        }
    }
}

/// Retry policy applied to backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetrySettings {
    /// Classification cycles allowed per logical call.
    #[serde(default = "default_retry_budget")]
    #[validate(range(min = 1))]
    pub budget: u32,

    /// Pause before retrying after a backend timeout.
    #[serde(with = "humantime_serde", default = "default_timeout_backoff")]
    pub timeout_backoff: Duration,
}

fn default_retry_budget() -> u32 {
    2
}

fn default_timeout_backoff() -> Duration {
    Duration::from_millis(100)
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            budget: default_retry_budget(),
            timeout_backoff: default_timeout_backoff(),
        }
    }
}

/// Resolution of the connection handle and named caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConnectionSettings {
    /// Attempts before giving up on a handle or named cache.
    #[serde(default = "default_resolve_attempts")]
    #[validate(range(min = 1))]
    pub resolve_attempts: u32,

    /// Pause between attempts.
    #[serde(with = "humantime_serde", default = "default_resolve_backoff")]
    pub resolve_backoff: Duration,
}

fn default_resolve_attempts() -> u32 {
    5
}

fn default_resolve_backoff() -> Duration {
    Duration::from_secs(2)
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            resolve_attempts: default_resolve_attempts(),
            resolve_backoff: default_resolve_backoff(),
        }
    }
}

fn non_zero_duration(value: &Duration) -> std::result::Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("non_zero_duration"));
    }
    Ok(())
}

/// Resilient cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Named cache opened on the backend.
    #[serde(default = "default_cache_name")]
    #[validate(length(min = 1))]
    pub cache_name: String,

    /// First segment of every region identifier.
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,

    /// Second segment of every region identifier.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Cache hosts handed to the connector.
    #[serde(default)]
    #[validate(nested)]
    pub endpoints: Vec<EndpointConfig>,

    /// Connect when the factory is built instead of on first use.
    #[serde(default)]
    pub connect_on_startup: bool,

    /// Keep-alive probing.
    #[serde(default)]
    #[validate(nested)]
    pub availability: AvailabilitySettings,

    /// Retry policy.
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetrySettings,

    /// Handle resolution.
    #[serde(default)]
    #[validate(nested)]
    pub connection: ConnectionSettings,
}

fn default_cache_name() -> String {
    "default".to_string()
}

fn default_instance_prefix() -> String {
    "default".to_string()
}

fn default_schema_version() -> String {
    "1".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            instance_prefix: default_instance_prefix(),
            schema_version: default_schema_version(),
            endpoints: Vec::new(),
            connect_on_startup: false,
            availability: AvailabilitySettings::default(),
            retry: RetrySettings::default(),
            connection: ConnectionSettings::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Load and validate a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        debug!(path = %path.display(), cache = %config.cache_name, "Loaded cache configuration");
        config.validate_config()?;
        Ok(config)
    }

    /// Defaults overridden by the `RESILIENT_CACHE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate_config()?;
        Ok(config)
    }

    /// Apply the `RESILIENT_CACHE_*` environment variables that are set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_CACHE_NAME) {
            self.cache_name = name;
        }
        if let Some(prefix) = lookup(ENV_INSTANCE_PREFIX) {
            self.instance_prefix = prefix;
        }
        if let Some(version) = lookup(ENV_SCHEMA_VERSION) {
            self.schema_version = version;
        }
        if let Some(endpoints) = lookup(ENV_ENDPOINTS) {
            self.endpoints = endpoints
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<EndpointConfig>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| ConfigError::env(ENV_ENDPOINTS, e))?;
        }
        if let Some(flag) = lookup(ENV_CONNECT_ON_STARTUP) {
            self.connect_on_startup = parse_flag(&flag)
                .ok_or_else(|| ConfigError::env(ENV_CONNECT_ON_STARTUP, "expected true or false"))?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate_config(&self) -> Result<()> {
        self.validate()?;
        if self.availability.first_probe_poll_interval > self.availability.first_probe_wait {
            return Err(ConfigError::validation(
                "availability.first_probe_poll_interval must not exceed first_probe_wait",
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for cache configuration.
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the named cache.
    #[must_use]
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.config.cache_name = name.into();
        self
    }

    /// Set the instance prefix of region identifiers.
    #[must_use]
    pub fn instance_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.instance_prefix = prefix.into();
        self
    }

    /// Set the schema version of region identifiers.
    #[must_use]
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.config.schema_version = version.into();
        self
    }

    /// Add a cache host.
    #[must_use]
    pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.endpoints.push(EndpointConfig::new(host, port));
        self
    }

    /// Connect eagerly when the factory is built.
    #[must_use]
    pub fn connect_on_startup(mut self, eager: bool) -> Self {
        self.config.connect_on_startup = eager;
        self
    }

    /// Set the keep-alive cooldown.
    #[must_use]
    pub fn probe_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.availability.probe_cooldown = cooldown;
        self
    }

    /// Set the wait for the first probe.
    #[must_use]
    pub fn first_probe_wait(mut self, wait: Duration, poll_interval: Duration) -> Self {
        self.config.availability.first_probe_wait = wait;
        self.config.availability.first_probe_poll_interval = poll_interval;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.config.retry.budget = budget;
        self
    }

    /// Set the pause after a backend timeout.
    #[must_use]
    pub fn timeout_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry.timeout_backoff = backoff;
        self
    }

    /// Set handle resolution attempts and the pause between them.
    #[must_use]
    pub fn resolve_policy(mut self, attempts: u32, backoff: Duration) -> Self {
        self.config.connection.resolve_attempts = attempts;
        self.config.connection.resolve_backoff = backoff;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<CacheConfig> {
        self.config.validate_config()?;
        Ok(self.config)
    }
}
