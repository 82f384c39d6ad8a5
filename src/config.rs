//! Configuration management for Sprout
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.sprout/config.json` and cached in memory
//! after first access.

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::audio::SilenceDetectorConfig;
use crate::speech::SpeechSettings;
use crate::store::session::{DEFAULT_STUDENT_AGE, DEFAULT_SUBJECT};
use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Current config schema version
const CURRENT_VERSION: u32 = 2;

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Backend connection
    pub api: ApiConfig,
    /// Who is studying, and what
    pub student: StudentConfig,
    /// Text-to-speech playback defaults
    pub speech: SpeechSettings,
    /// End-of-utterance silence detection
    pub silence: SilenceDetectorConfig,
    /// Automatic resend of failed voice messages
    pub retry: RetryConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            api: ApiConfig::default(),
            student: StudentConfig::default(),
            speech: SpeechSettings::default(),
            silence: SilenceDetectorConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL including the `/api` prefix
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentConfig {
    /// Stable student id; empty means one is generated per session
    pub student_id: String,
    pub subject: String,
    pub student_age: u32,
    /// Topic sent when a session is created
    pub topic: String,
}

impl Default for StudentConfig {
    fn default() -> Self {
        Self {
            student_id: String::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            student_age: DEFAULT_STUDENT_AGE,
            topic: "学习伙伴".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for progress data (None for ~/.sprout)
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory progress is stored in
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(get_config_dir)
    }
}

/// Get the path to the config file (~/.sprout/config.json)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the path to the config directory (~/.sprout)
pub fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".sprout")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from `path`, migrating older schemas
///
/// A missing file yields defaults. A migrated config is written back.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!("Config file not found, using defaults");
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = serde_json::from_str(&contents).context("Failed to parse config")?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            migrated.version
        );
        save_to_path(&migrated, path)?;
    }

    Ok(migrated)
}

/// Save configuration to `path`, creating parent directories
pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
    }

    let contents = serde_json::to_string_pretty(config).context("Failed to serialise config")?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;

    tracing::info!("Config saved to disk: base_url={}", config.api.base_url);
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config> {
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }
    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config> {
    match config.version {
        // Version 0 -> 1: initial versioned schema
        0 => Ok(Config {
            version: 1,
            ..config
        }),
        // Version 1 -> 2: retry section added; a zero attempt count from
        // hand-edited files means "use the default"
        1 => {
            let mut migrated = config;
            if migrated.retry.max_attempts == 0 {
                migrated.retry = RetryConfig::default();
            }
            migrated.version = 2;
            Ok(migrated)
        }
        v => Err(anyhow!("Unknown config version: {}", v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = load_from_path(&get_config_path()).unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        });
        tracing::info!("Config loaded: base_url={}", config.api.base_url);
        RwLock::new(config)
    })
}

/// Get the current configuration
///
/// The config is cached in memory and loaded from disk on first access.
pub fn get_config() -> Config {
    get_config_instance().read().clone()
}

/// Replace the configuration and persist it
///
/// The version field is automatically updated to the current schema.
pub fn set_config(mut config: Config) -> Result<()> {
    config.version = CURRENT_VERSION;

    save_to_path(&config, &get_config_path())?;

    let mut cached = get_config_instance().write();
    *cached = config;

    tracing::info!("Configuration updated (base_url: {})", cached.api.base_url);
    Ok(())
}

/// Reset configuration to defaults and persist it
pub fn reset_config() -> Result<Config> {
    let default_config = Config::default();

    save_to_path(&default_config, &get_config_path())?;

    let mut cached = get_config_instance().write();
    *cached = default_config.clone();

    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}
