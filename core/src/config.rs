//! Configuration Module
//!
//! Handles loading configuration from the first TOML file found of:
//! 1. the path in `ARCPSI_CONFIG`
//! 2. ~/.arcpsi/config.toml
//! 3. ./config.toml
//!
//! `ARCPSI_*` environment variables then override individual values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use crate::client::ClientConfig;
use crate::engine::{EngineKey, LocalEngineConfig};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".arcpsi";

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArcPsiConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub client: ClientTomlConfig,
}

/// Ledger backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Rocksdb,
    Memory,
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
    #[serde(default)]
    pub backend: LedgerBackend,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            backend: LedgerBackend::Rocksdb,
        }
    }
}

fn default_ledger_path() -> String {
    "./arcpsi-ledger".to_string()
}

/// Local compute engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hex-encoded 32-byte proof key. A fresh key is generated when unset,
    /// which strands any request left pending by a previous run.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default)]
    pub compute_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key: None,
            queue_depth: default_queue_depth(),
            compute_delay_ms: 0,
        }
    }
}

fn default_queue_depth() -> usize {
    64
}

/// Client configuration (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTomlConfig {
    #[serde(default = "default_status_window")]
    pub status_window_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ClientTomlConfig {
    fn default() -> Self {
        Self {
            status_window_ms: default_status_window(),
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_status_window() -> u64 {
    3000
}

fn default_poll_interval() -> u64 {
    100
}

fn default_max_polls() -> u32 {
    600
}

impl ArcPsiConfig {
    /// Load configuration from ~/.arcpsi/config.toml with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::find_config_file() {
            log::info!("Loading config from: {}", config_path.display());
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;
        } else {
            log::info!("No config file found, using defaults and environment variables");
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check ARCPSI_CONFIG env var
        if let Ok(path) = env::var("ARCPSI_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ~/.arcpsi/config.toml
        if let Some(home_dir) = dirs::home_dir() {
            let config_path = home_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Ledger
        if let Ok(v) = env::var("ARCPSI_DB_PATH") {
            self.ledger.path = v;
        }
        if let Ok(v) = env::var("ARCPSI_LEDGER_BACKEND") {
            match v.to_lowercase().as_str() {
                "rocksdb" => self.ledger.backend = LedgerBackend::Rocksdb,
                "memory" => self.ledger.backend = LedgerBackend::Memory,
                _ => log::warn!("Ignoring unknown ARCPSI_LEDGER_BACKEND={}", v),
            }
        }

        // Engine
        if let Ok(v) = env::var("ARCPSI_ENGINE_KEY") {
            self.engine.key = Some(v);
        }
        if let Ok(v) = env::var("ARCPSI_ENGINE_QUEUE") {
            if let Ok(n) = v.parse() {
                self.engine.queue_depth = n;
            }
        }

        // Client
        if let Ok(v) = env::var("ARCPSI_POLL_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.client.poll_interval_ms = n;
            }
        }
        if let Ok(v) = env::var("ARCPSI_STATUS_WINDOW_MS") {
            if let Ok(n) = v.parse() {
                self.client.status_window_ms = n;
            }
        }
        if let Ok(v) = env::var("ARCPSI_MAX_POLLS") {
            if let Ok(n) = v.parse() {
                self.client.max_polls = n;
            }
        }
    }

    /// Resolve the engine proof key
    pub fn engine_key(&self) -> Result<EngineKey> {
        match &self.engine.key {
            Some(hex_key) => EngineKey::from_hex(hex_key).context("invalid engine key"),
            None => {
                log::warn!("No engine key configured, generating an ephemeral one");
                Ok(EngineKey::generate())
            }
        }
    }

    /// Convert to LocalEngineConfig
    pub fn to_engine_config(&self) -> LocalEngineConfig {
        LocalEngineConfig {
            queue_depth: self.engine.queue_depth,
            compute_delay_ms: self.engine.compute_delay_ms,
        }
    }

    /// Convert to ClientConfig
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            status_window: Duration::from_millis(self.client.status_window_ms),
            poll_interval: Duration::from_millis(self.client.poll_interval_ms),
            max_polls: self.client.max_polls,
        }
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let sample = Self {
            ledger: LedgerConfig {
                path: "./arcpsi-ledger".to_string(),
                backend: LedgerBackend::Rocksdb,
            },
            engine: EngineConfig {
                key: Some(EngineKey::generate().to_hex()),
                queue_depth: 64,
                compute_delay_ms: 0,
            },
            client: ClientTomlConfig {
                status_window_ms: 3000,
                poll_interval_ms: 100,
                max_polls: 600,
            },
        };

        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArcPsiConfig::default();
        assert_eq!(config.ledger.path, "./arcpsi-ledger");
        assert_eq!(config.ledger.backend, LedgerBackend::Rocksdb);
        assert_eq!(config.engine.queue_depth, 64);
        assert_eq!(config.client.poll_interval_ms, 100);
    }

    #[test]
    fn test_generate_sample() {
        let sample = ArcPsiConfig::generate_sample();
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[engine]"));
        assert!(sample.contains("[client]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ArcPsiConfig::generate_sample();
        let parsed: ArcPsiConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.client.status_window_ms, 3000);
        assert!(parsed.engine_key().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: ArcPsiConfig = toml::from_str("[ledger]\nbackend = \"memory\"\n").unwrap();
        assert_eq!(parsed.ledger.backend, LedgerBackend::Memory);
        assert_eq!(parsed.ledger.path, "./arcpsi-ledger");
        assert_eq!(parsed.client.max_polls, 600);
    }

    #[test]
    fn test_bad_engine_key_rejected() {
        let mut config = ArcPsiConfig::default();
        config.engine.key = Some("not-hex".to_string());
        assert!(config.engine_key().is_err());
    }
}
