//! Settings for the tunnels manager and its tools.
//!
//! Settings are read from a TOML file, then environment variables with the
//! `WG_MANAGER_` prefix are applied on top.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::tunnel::ManagerOptions;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Error reading the settings file
    #[error("Failed to read settings file: {0}")]
    IoError(#[from] io::Error),

    /// Error parsing TOML
    #[error("Failed to parse TOML settings: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Error serializing settings to TOML
    #[error("Failed to serialize settings to TOML: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Invalid settings value
    #[error("Invalid settings value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Settings file not found
    #[error("Settings file not found at {0}")]
    FileNotFound(PathBuf),
}

/// Timeouts and polling intervals for the manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManagerSettings {
    /// Seconds a tunnel may stay activating before it is failed (default: 30)
    #[serde(default = "default_activation_timeout_secs")]
    pub activation_timeout_secs: u64,

    /// Seconds a tunnel may stay deactivating or restarting (default: 15)
    #[serde(default = "default_deactivation_timeout_secs")]
    pub deactivation_timeout_secs: u64,

    /// How often runtime configuration and stats are refreshed while a
    /// tunnel is shown (default: 1000)
    #[serde(default = "default_runtime_refresh_interval_ms")]
    pub runtime_refresh_interval_ms: u64,
}

fn default_activation_timeout_secs() -> u64 {
    30
}

fn default_deactivation_timeout_secs() -> u64 {
    15
}

fn default_runtime_refresh_interval_ms() -> u64 {
    1000
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            activation_timeout_secs: default_activation_timeout_secs(),
            deactivation_timeout_secs: default_deactivation_timeout_secs(),
            runtime_refresh_interval_ms: default_runtime_refresh_interval_ms(),
        }
    }
}

impl ManagerSettings {
    pub fn runtime_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.runtime_refresh_interval_ms)
    }
}

impl From<&ManagerSettings> for ManagerOptions {
    fn from(settings: &ManagerSettings) -> Self {
        ManagerOptions {
            activation_timeout: Duration::from_secs(settings.activation_timeout_secs),
            deactivation_timeout: Duration::from_secs(settings.deactivation_timeout_secs),
        }
    }
}

/// Where tunnel configurations are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct StorageSettings {
    /// Directory holding one wg-quick `*.conf` file per tunnel
    #[serde(default)]
    pub tunnels_dir: Option<PathBuf>,
}

impl StorageSettings {
    /// The configured directory, or `<config dir>/wg-manager/tunnels`.
    pub fn tunnels_dir(&self) -> PathBuf {
        self.tunnels_dir.clone().unwrap_or_else(|| {
            Settings::default_path()
                .parent()
                .map(|dir| dir.join("tunnels"))
                .unwrap_or_else(|| PathBuf::from("tunnels"))
        })
    }
}

/// Log output options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,

    /// Also write a daily-rolling log file
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for log files (default: `./logs`)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Log level (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub manager: ManagerSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: default_log_level(),
            manager: ManagerSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Load settings from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.validate()?;

        // Environment takes precedence over the file
        Self::apply_env_overrides(&mut settings);
        settings.validate()?;

        Ok(settings)
    }

    /// Defaults plus environment overrides, for when no file exists.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Settings::default();
        Self::apply_env_overrides(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(SettingsError::InvalidValue {
                key: "log_level".to_string(),
                message: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
        if self.manager.activation_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue {
                key: "manager.activation_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.manager.deactivation_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue {
                key: "manager.deactivation_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.manager.runtime_refresh_interval_ms == 0 {
            return Err(SettingsError::InvalidValue {
                key: "manager.runtime_refresh_interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides (prefix: WG_MANAGER_)
    ///
    /// - WG_MANAGER_LOG_LEVEL
    /// - WG_MANAGER_ACTIVATION_TIMEOUT_SECS, WG_MANAGER_DEACTIVATION_TIMEOUT_SECS,
    ///   WG_MANAGER_RUNTIME_REFRESH_INTERVAL_MS
    /// - WG_MANAGER_TUNNELS_DIR
    /// - WG_MANAGER_LOG_JSON, WG_MANAGER_LOG_TO_FILE, WG_MANAGER_LOG_DIR
    ///
    /// Values that do not parse are ignored.
    fn apply_env_overrides(settings: &mut Settings) {
        use std::env;

        fn parse_bool(s: &str) -> Option<bool> {
            match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        }

        if let Ok(v) = env::var("WG_MANAGER_LOG_LEVEL") {
            settings.log_level = v.trim().to_string();
        }

        if let Some(n) = env::var("WG_MANAGER_ACTIVATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            settings.manager.activation_timeout_secs = n;
        }
        if let Some(n) = env::var("WG_MANAGER_DEACTIVATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            settings.manager.deactivation_timeout_secs = n;
        }
        if let Some(n) = env::var("WG_MANAGER_RUNTIME_REFRESH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            settings.manager.runtime_refresh_interval_ms = n;
        }

        if let Ok(v) = env::var("WG_MANAGER_TUNNELS_DIR") {
            settings.storage.tunnels_dir = Some(PathBuf::from(v));
        }

        if let Some(b) = env::var("WG_MANAGER_LOG_JSON")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            settings.logging.json = b;
        }
        if let Some(b) = env::var("WG_MANAGER_LOG_TO_FILE")
            .ok()
            .and_then(|v| parse_bool(&v))
        {
            settings.logging.log_to_file = b;
        }
        if let Ok(v) = env::var("WG_MANAGER_LOG_DIR") {
            settings.logging.log_dir = Some(PathBuf::from(v));
        }
    }

    /// Reload settings from `path`.
    pub fn reload(&mut self, path: &Path) -> Result<(), SettingsError> {
        *self = Self::load(path)?;
        Ok(())
    }

    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("wg-manager").join("settings.toml")
        } else {
            PathBuf::from("settings.toml")
        }
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions::from(&self.manager)
    }
}

/// Settings together with the file they came from.
#[derive(Debug)]
pub struct SettingsManager {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Default settings bound to the default path
    pub fn new() -> Self {
        SettingsManager {
            settings: Settings::default(),
            settings_path: Settings::default_path(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load(&path)?;

        Ok(SettingsManager {
            settings,
            settings_path: path,
        })
    }

    /// Load from the default path, falling back to defaults plus
    /// environment overrides when no file exists there.
    pub fn load_default() -> Result<Self, SettingsError> {
        match Self::load(Settings::default_path()) {
            Err(SettingsError::FileNotFound(path)) => Ok(SettingsManager {
                settings: Settings::from_env()?,
                settings_path: path,
            }),
            other => other,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn reload(&mut self) -> Result<(), SettingsError> {
        self.settings.reload(&self.settings_path)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.settings.save(&self.settings_path)
    }

    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        self.settings.save(path)
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.manager.activation_timeout_secs, 30);
        assert_eq!(settings.manager.deactivation_timeout_secs, 15);
        assert_eq!(settings.manager.runtime_refresh_interval_ms, 1000);
        assert!(!settings.logging.json);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_partial_settings() {
        let mut file = NamedTempFile::new().unwrap();
        let settings_str = r#"
            log_level = "debug"

            [manager]
            activation_timeout_secs = 5

            [storage]
            tunnels_dir = "/tmp/tunnels"
        "#;
        file.write_all(settings_str.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.manager.activation_timeout_secs, 5);
        assert_eq!(settings.manager.deactivation_timeout_secs, 15);
        assert_eq!(settings.storage.tunnels_dir(), PathBuf::from("/tmp/tunnels"));

        let options = settings.manager_options();
        assert_eq!(options.activation_timeout, Duration::from_secs(5));
        assert_eq!(options.deactivation_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_validation() {
        let settings = Settings {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue { ref key, .. }) if key == "log_level"
        ));

        let settings = Settings {
            manager: ManagerSettings {
                activation_timeout_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::FileNotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_settings_manager_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        Settings::default().save(&path).unwrap();

        let mut manager = SettingsManager::load(&path).unwrap();
        manager.settings_mut().logging.json = true;
        manager.settings_mut().manager.runtime_refresh_interval_ms = 250;
        manager.save().unwrap();

        manager.reload().unwrap();
        assert!(manager.settings().logging.json);
        assert_eq!(
            manager.settings().manager.runtime_refresh_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(manager.settings_path(), path.as_path());
    }
}
