//! Configuration management
//!
//! The configuration lives in `config.toml` inside the config directory.
//! The directory is resolved once at startup and passed around explicitly.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::session::CleanupPolicy;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "STOW_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const SESSION_DIR: &str = "session";
const CONFIG_VERSION: &str = "1";

/// Session settings from the `[session]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Override for the session directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,

    #[serde(default)]
    pub aliases: Vec<Alias>,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            aliases: Vec::new(),
            session: SessionConfig::default(),
        }
    }
}

/// Locates, loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Resolve the config directory from `STOW_CONFIG_DIR` or the platform default
    pub fn new() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::with_dir(dir));
        }
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("Unable to determine config directory".to_string()))?;
        Ok(Self::with_dir(base.join("stow")))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn exists(&self) -> bool {
        self.config_path().is_file()
    }

    /// Session directory: the configured override or `<config-dir>/session`
    pub fn session_dir(&self, config: &Config) -> PathBuf {
        config
            .session
            .dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join(SESSION_DIR))
    }

    /// Load the configuration, failing if the file does not exist
    pub fn load(&self) -> Result<Config> {
        let path = self.config_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.display().to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        if config.version != CONFIG_VERSION {
            return Err(Error::Config(format!(
                "Unsupported config version '{}' in {}",
                config.version,
                path.display()
            )));
        }

        Ok(config)
    }

    /// Load the configuration, or the defaults when no file exists yet
    pub fn load_or_default(&self) -> Result<Config> {
        match self.load() {
            Ok(config) => Ok(config),
            Err(Error::ConfigNotFound(_)) => Ok(Config::default()),
            Err(e) => Err(e),
        }
    }

    /// Atomically write the configuration file
    pub fn save(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;

        let contents = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.config_dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.config_path()).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %self.config_path().display(), "Saved configuration");
        Ok(())
    }
}
