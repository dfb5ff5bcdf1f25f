//! Host configuration: engine settings plus connectivity and knowledge
//! file options, persisted as TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vantage_search::EngineConfig;

use crate::error::{AppError, Result};

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "VANTAGE_API_KEY";

/// Environment variable holding the provider engine id.
pub const ENGINE_ID_ENV: &str = "VANTAGE_ENGINE_ID";

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search engine settings.
    pub engine: EngineConfig,
    /// Reachability probing.
    pub connectivity: ConnectivityConfig,
    /// Local knowledge file.
    pub knowledge: KnowledgeConfig,
}

/// How the host decides whether it is online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Probe before each search. When off, the host assumes it is online.
    pub probe: bool,
    /// `host:port` to probe. Defaults to the provider endpoint.
    pub address: Option<String>,
    /// Connect timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe: true,
            address: None,
            timeout_ms: 1_500,
        }
    }
}

impl ConnectivityConfig {
    /// The probe timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where local knowledge is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Knowledge file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Serialise to pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if serialisation fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Copy of this configuration safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.engine.provider.api_key.is_some() {
            copy.engine.provider.api_key = Some("<redacted>".into());
        }
        copy
    }

    /// Returns the default config file path: `<config dir>/vantage/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::vantage_dirs::config_file()
    }

    /// The knowledge file to use.
    pub fn knowledge_path(&self) -> PathBuf {
        self.knowledge
            .path
            .clone()
            .unwrap_or_else(crate::vantage_dirs::knowledge_file)
    }

    /// Fill provider credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Fill provider credentials from `lookup`. Non-empty values override
    /// the file.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.engine.provider.api_key = Some(key);
        }
        if let Some(id) = lookup(ENGINE_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.engine.provider.engine_id = Some(id);
        }
    }
}
