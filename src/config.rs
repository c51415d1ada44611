use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ServiceRecord;

const CONFIG_ENV: &str = "SERVICE_NOTIFIER_CONFIG";
const CONFIG_FILE_NAME: &str = ".service-notifier.json";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default, deserialize_with = "lenient_service_list")]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub updates: UpdatesConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MonitoringConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_auto_add_patterns")]
    pub auto_add_patterns: Vec<String>,
    #[serde(default)]
    pub pending_escalation_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationsConfig {
    #[serde(default = "default_notify_of_status_change")]
    pub notify_of_status_change: bool,
    #[serde(default = "default_notify_of_auto_service_addition")]
    pub notify_of_auto_service_addition: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UpdatesConfig {
    /// Bitmask written by the external update checker (see `updates`).
    #[serde(default)]
    pub update_check: u8,
}

// Defaults for MonitoringConfig
fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_auto_add_patterns() -> Vec<String> {
    vec!["mysql".to_string()]
}

// Defaults for NotificationsConfig
fn default_notify_of_status_change() -> bool {
    true
}

fn default_notify_of_auto_service_addition() -> bool {
    true
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            auto_add_patterns: default_auto_add_patterns(),
            pending_escalation_secs: None,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            notify_of_status_change: default_notify_of_status_change(),
            notify_of_auto_service_addition: default_notify_of_auto_service_addition(),
        }
    }
}

/// A corrupt service list is recoverable: start with nothing tracked.
fn lenient_service_list<'de, D>(deserializer: D) -> Result<Vec<ServiceRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    match serde_json::from_value::<Vec<ServiceRecord>>(value) {
        Ok(list) => Ok(list),
        Err(e) => {
            warn!("Ignoring unreadable service list: {}", e);
            Ok(Vec::new())
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

pub fn load_or_create_config_at(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        serde_json::from_str::<Config>(&content).context("failed to parse config file")
    } else {
        let config = Config::default();
        save_config_at(path, &config)?;
        Ok(config)
    }
}

/// Load config from disk and validate it. Used for hot-reload.
pub fn load_and_validate_config_at(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).context("failed to read config file")?;
    let config: Config = serde_json::from_str(&content).context("invalid JSON in config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.monitoring.poll_interval_ms == 0 {
        return Err(anyhow!("poll_interval_ms must be greater than zero"));
    }
    if config
        .monitoring
        .auto_add_patterns
        .iter()
        .any(|p| p.trim().is_empty())
    {
        return Err(anyhow!("auto_add_patterns must not contain empty patterns"));
    }
    if config.monitoring.pending_escalation_secs == Some(0) {
        return Err(anyhow!("pending_escalation_secs must be greater than zero"));
    }
    Ok(())
}

pub fn save_config_at(path: &Path, config: &Config) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, content).context("failed to write config file")?;
    Ok(())
}

/// Where the monitor writes back membership and the update mask.
pub trait SettingsStore {
    fn save(&mut self, config: &Config) -> Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn save(&mut self, config: &Config) -> Result<()> {
        save_config_at(&self.path, config)
    }
}
