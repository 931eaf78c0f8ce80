use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

use todosync_core::store::DEFAULT_TABLE;
use todosync_core::{StoreCredentials, DEFAULT_COLLECTION_URL};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// REST collection URL
    pub rest_url: ConfigValue<String>,
    /// Table store project URL
    pub store_url: ConfigValue<Option<String>>,
    /// Table store anonymous key
    #[serde(serialize_with = "serialize_masked")]
    pub anon_key: ConfigValue<Option<String>>,
    /// Table holding the todos
    pub table: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Store section of the config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreFile {
    url: Option<String>,
    anon_key: Option<String>,
    table: Option<String>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    rest_url: Option<String>,
    store: Option<StoreFile>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut rest_url =
            ConfigValue::new(DEFAULT_COLLECTION_URL.to_string(), ConfigSource::Default);
        let mut store_url = ConfigValue::new(None, ConfigSource::Default);
        let mut anon_key = ConfigValue::new(None, ConfigSource::Default);
        let mut table = ConfigValue::new(DEFAULT_TABLE.to_string(), ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(url) = file_config.rest_url {
                rest_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(store) = file_config.store {
                if let Some(url) = store.url {
                    store_url = ConfigValue::new(Some(url), ConfigSource::File);
                }
                if let Some(key) = store.anon_key {
                    anon_key = ConfigValue::new(Some(key), ConfigSource::File);
                }
                if let Some(name) = store.table {
                    table = ConfigValue::new(name, ConfigSource::File);
                }
            }
        }

        // Apply environment variable overrides
        if let Ok(url) = std::env::var("TODOSYNC_REST_URL") {
            rest_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            store_url = ConfigValue::new(Some(url), ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            anon_key = ConfigValue::new(Some(key), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("TODOSYNC_TABLE") {
            table = ConfigValue::new(name, ConfigSource::Environment);
        }

        Ok(Self {
            rest_url,
            store_url,
            anon_key,
            table,
            config_file,
        })
    }

    /// Store credentials, if both the project URL and the key are set.
    pub fn credentials(&self) -> Result<StoreCredentials, ConfigError> {
        let url = non_blank(&self.store_url.value);
        let key = non_blank(&self.anon_key.value);
        match (url, key) {
            (Some(url), Some(key)) => Ok(StoreCredentials::new(url, key)),
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/todosync/
    /// - macOS: ~/Library/Application Support/todosync/
    /// - Windows: %APPDATA%/todosync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todosync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Only shows whether a secret is present.
fn serialize_masked<S: Serializer>(
    value: &ConfigValue<Option<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let masked = ConfigValue::new(
        value.value.as_ref().map(|_| "********"),
        value.source.clone(),
    );
    masked.serialize(serializer)
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    MissingCredentials,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingCredentials => write!(
                f,
                "Table store credentials are missing. Set SUPABASE_URL and SUPABASE_ANON_KEY \
                 or add a 'store' section to the config file"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
