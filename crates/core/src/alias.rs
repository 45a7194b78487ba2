//! Alias management
//!
//! An alias names an S3-compatible endpoint together with its credentials.
//! Aliases live in the `[[aliases]]` table of the configuration file.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Retry settings applied to every request made through an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// A named storage endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket addressing style: auto, path or dns
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl Alias {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            retry: RetryConfig::default(),
        }
    }
}

/// Reads and writes aliases through a [`ConfigManager`]
#[derive(Debug, Clone)]
pub struct AliasManager {
    config: ConfigManager,
}

impl AliasManager {
    pub fn new(config: ConfigManager) -> Self {
        Self { config }
    }

    /// Look up an alias by name
    pub fn get(&self, name: &str) -> Result<Alias> {
        let config = self.config.load_or_default()?;
        config
            .aliases
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))
    }

    /// Whether an alias with this name is configured
    pub fn contains(&self, name: &str) -> Result<bool> {
        let config = self.config.load_or_default()?;
        Ok(config.aliases.iter().any(|a| a.name == name))
    }

    /// Add an alias, replacing any existing alias with the same name
    pub fn set(&self, alias: Alias) -> Result<()> {
        let mut config = self.config.load_or_default()?;
        config.aliases.retain(|a| a.name != alias.name);
        config.aliases.push(alias);
        self.config.save(&config)
    }

    /// All aliases, sorted by name
    pub fn list(&self) -> Result<Vec<Alias>> {
        let mut aliases = self.config.load_or_default()?.aliases;
        aliases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(aliases)
    }

    /// Remove an alias. Fails with `ConfigNotFound` when nothing was ever configured.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config.load()?;
        let before = config.aliases.len();
        config.aliases.retain(|a| a.name != name);
        if config.aliases.len() == before {
            return Err(Error::AliasNotFound(name.to_string()));
        }
        self.config.save(&config)
    }
}
