//! The `beacon.toml` configuration file
//!
//! ```toml
//! [provider]
//! endpoint = "https://api.beacon.example/v1"
//! token_env = "BEACON_TOKEN"
//! timeout = "30s"
//!
//! [provider.retry]
//! max_attempts = 3
//! base_delay = "500ms"
//! max_delay = "10s"
//!
//! [resources.team.platform]
//! name = "Platform"
//! members = ["a@example.com"]
//! ```
//!
//! Every `[resources.<kind>.<name>]` table becomes the desired attribute tree
//! of instance `<kind>.<name>`.

use anyhow::{Context, Result, bail};
use beaconapi::{ClientConfig, RetryConfig};
use declarative::{Address, AttributeTree, Value};
use regex::Regex;
use scalar::{Decimal, Duration};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Instance names: lowercase, start with a letter, then letters, digits, `_` or `-`.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap()
});

/// The whole configuration file
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BeaconConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// kind -> name -> attributes
    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, toml::Table>>,
}

/// Remote API settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout
    #[serde(default)]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: default_token_env(),
            timeout: None,
            retry: RetrySettings::default(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.beacon.example/v1".to_string()
}

fn default_token_env() -> String {
    "BEACON_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
}

impl ProviderConfig {
    /// Build the API client configuration, reading the token from the environment.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::new(self.endpoint.clone());
        if let Ok(token) = std::env::var(&self.token_env)
            && !token.is_empty()
        {
            config = config.with_token(token);
        } else {
            log::debug!("{} is not set; sending unauthenticated requests", self.token_env);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(positive(timeout, "provider.timeout")?);
        }

        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: match self.retry.base_delay {
                Some(d) => positive(d, "provider.retry.base_delay")?,
                None => defaults.base_delay,
            },
            max_delay: match self.retry.max_delay {
                Some(d) => positive(d, "provider.retry.max_delay")?,
                None => defaults.max_delay,
            },
            ..defaults
        };
        Ok(config.with_retry(retry))
    }
}

/// Convert to a std duration, rejecting negative values.
pub fn positive(duration: Duration, field: &str) -> Result<std::time::Duration> {
    duration
        .to_std()
        .with_context(|| format!("{field} must not be negative (got {duration})"))
}

impl BeaconConfig {
    /// Load the config file. A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        Ok(config)
    }

    /// Validate instance names and kinds against the known kinds.
    pub fn validate(&self, known_kinds: &[&str]) -> Result<()> {
        for (kind, instances) in &self.resources {
            if !known_kinds.contains(&kind.as_str()) {
                bail!(
                    "Unknown resource kind '{}' (known kinds: {})",
                    kind,
                    known_kinds.join(", ")
                );
            }
            for name in instances.keys() {
                if !NAME_RE.is_match(name) {
                    bail!(
                        "Invalid name '{kind}.{name}': names start with a lowercase letter and \
                         contain only lowercase letters, digits, '_' and '-'"
                    );
                }
            }
        }
        Ok(())
    }

    /// Desired attribute trees for every configured instance.
    pub fn desired(&self) -> Result<BTreeMap<Address, AttributeTree>> {
        let mut desired = BTreeMap::new();
        for (kind, instances) in &self.resources {
            for (name, table) in instances {
                let address = Address::new(kind.clone(), name.clone());
                let tree = table_to_tree(table)
                    .with_context(|| format!("Invalid attributes for {address}"))?;
                desired.insert(address, tree);
            }
        }
        Ok(desired)
    }
}

/// Convert a TOML table into an attribute tree.
pub fn table_to_tree(table: &toml::Table) -> Result<AttributeTree> {
    table
        .iter()
        .map(|(k, v)| Ok((k.clone(), toml_to_value(v)?)))
        .collect()
}

fn toml_to_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Number(
            Decimal::from_f64(*f).with_context(|| format!("{f} is not a finite number"))?,
        ),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => {
            Value::List(items.iter().map(toml_to_value).collect::<Result<_>>()?)
        }
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| Ok((k.clone(), toml_to_value(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}
