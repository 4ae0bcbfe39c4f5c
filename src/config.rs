// ABOUTME: Connection configuration for sql-tabular
// ABOUTME: Reads SQL Server credentials from the environment or a JSON profile file

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable names, in the order they are checked.
pub const ENV_DRIVER: &str = "sql_driver";
pub const ENV_SERVER: &str = "sql_server";
pub const ENV_DATABASE: &str = "sql_database";
pub const ENV_USER: &str = "sql_user";
pub const ENV_PASSWORD: &str = "sql_pwd";

const DEFAULT_PORT: u16 = 1433;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("Invalid server address: {0}")]
    InvalidServer(String),
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
}

/// Credentials and target for a single SQL Server database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    pub driver: String,
    pub server: String,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub trust_certificate: bool,
}

fn default_true() -> bool {
    true
}

/// Host and port parsed out of the `server` setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
}

impl ConnectionSettings {
    /// Read all five settings from the process environment, failing on the first missing one
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but over an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingSetting(key))
        };

        let settings = Self {
            driver: fetch(ENV_DRIVER)?,
            server: fetch(ENV_SERVER)?,
            database: fetch(ENV_DATABASE)?,
            user: fetch(ENV_USER)?,
            password: fetch(ENV_PASSWORD)?,
            trust_certificate: true,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check every field is present and the server address parses
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            (ENV_DRIVER, &self.driver),
            (ENV_SERVER, &self.server),
            (ENV_DATABASE, &self.database),
            (ENV_USER, &self.user),
            (ENV_PASSWORD, &self.password),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingSetting(name));
            }
        }
        self.address()?;
        Ok(())
    }

    /// Split `server` into host, port and named instance.
    ///
    /// Accepts `host`, `host,port` and `host\instance`, optionally prefixed with `tcp:`.
    pub fn address(&self) -> Result<ServerAddress, ConfigError> {
        let raw = self.server.trim();
        let raw = raw.strip_prefix("tcp:").unwrap_or(raw);

        let (host_part, port) = match raw.split_once(',') {
            Some((host, port)) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidServer(self.server.clone()))?;
                (host.trim(), Some(port))
            }
            None => (raw, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_string())),
            Some(_) => return Err(ConfigError::InvalidServer(self.server.clone())),
            None => (host_part, None),
        };

        if host.is_empty() {
            return Err(ConfigError::InvalidServer(self.server.clone()));
        }

        Ok(ServerAddress {
            host: host.to_string(),
            port,
            instance,
        })
    }
}

impl ServerAddress {
    /// Port to dial when no instance browser lookup is involved
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Profile file: named connection settings plus the one in use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_active_profile")]
    pub active_profile: String,
    #[serde(default)]
    pub profiles: HashMap<String, ConnectionSettings>,
}

fn default_version() -> u32 {
    1
}

fn default_active_profile() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            active_profile: default_active_profile(),
            profiles: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Get the config file path based on OS
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirFound)?;
        Ok(config_dir.join("sql-tabular").join("config.json"))
    }

    /// Load the default config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a file and validate every profile in it
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        for settings in config.profiles.values() {
            settings.validate()?;
        }
        Ok(config)
    }

    /// Load config from a file, or start an empty one if the file does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the active connection profile
    pub fn active_profile(&self) -> Result<&ConnectionSettings, ConfigError> {
        self.profile(&self.active_profile)
    }

    pub fn profile(&self, key: &str) -> Result<&ConnectionSettings, ConfigError> {
        self.profiles
            .get(key)
            .ok_or_else(|| ConfigError::ProfileNotFound(key.to_string()))
    }

    /// Add or update a profile
    pub fn set_profile(&mut self, key: String, settings: ConnectionSettings) {
        self.profiles.insert(key, settings);
    }

    /// Remove a profile (cannot remove if it's the only one)
    pub fn remove_profile(&mut self, key: &str) -> Result<(), ConfigError> {
        if self.profiles.len() <= 1 {
            return Err(ConfigError::ProfileNotFound(
                "Cannot remove the last profile".to_string(),
            ));
        }
        if self.profiles.remove(key).is_none() {
            return Err(ConfigError::ProfileNotFound(key.to_string()));
        }

        // If we removed the active profile, switch to another one
        if self.active_profile == key {
            if let Some(first_key) = self.profiles.keys().min() {
                self.active_profile = first_key.clone();
            }
        }
        Ok(())
    }
}
