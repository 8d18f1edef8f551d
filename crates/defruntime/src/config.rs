use defcore::{ConfigError, Kind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Whether application roots are watched for changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Debug,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RunMode::Production),
            "debug" | "development" | "dev" => Ok(RunMode::Debug),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Configuration for loading and watching definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Built-in definitions (`fs://`, bare path or `bin://`)
    pub engine_root: Option<String>,
    /// Namespace prepended to engine identifiers
    pub engine_prefix: String,
    pub api_root: Option<String>,
    pub flow_root: Option<String>,
    pub model_root: Option<String>,
    pub plugin_root: Option<String>,
    pub mode: RunMode,
    pub watch_debounce_ms: u64,
    pub restart_debounce_ms: u64,
    pub bind_address: String,
    pub event_buffer_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            engine_root: None,
            engine_prefix: "xiang".to_string(),
            api_root: None,
            flow_root: None,
            model_root: None,
            plugin_root: None,
            mode: RunMode::Production,
            watch_debounce_ms: 50,
            restart_debounce_ms: 100,
            bind_address: "0.0.0.0:3000".to_string(),
            event_buffer_size: 256,
        }
    }
}

impl LoaderConfig {
    /// Read configuration from `DEFS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.engine_root = lookup("DEFS_ENGINE_ROOT");
        if let Some(prefix) = lookup("DEFS_ENGINE_PREFIX") {
            config.engine_prefix = prefix;
        }
        config.api_root = lookup("DEFS_ROOT_API");
        config.flow_root = lookup("DEFS_ROOT_FLOW");
        config.model_root = lookup("DEFS_ROOT_MODEL");
        config.plugin_root = lookup("DEFS_ROOT_PLUGIN");

        if let Some(mode) = lookup("DEFS_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(ms) = lookup("DEFS_WATCH_DEBOUNCE_MS") {
            config.watch_debounce_ms = parse_number("DEFS_WATCH_DEBOUNCE_MS", &ms)?;
        }
        if let Some(ms) = lookup("DEFS_RESTART_DEBOUNCE_MS") {
            config.restart_debounce_ms = parse_number("DEFS_RESTART_DEBOUNCE_MS", &ms)?;
        }
        if let Some(address) = lookup("BIND_ADDRESS") {
            config.bind_address = address;
        }

        Ok(config)
    }

    /// Read configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
    }

    /// Application root configured for `kind`, if any
    pub fn app_root(&self, kind: Kind) -> Option<&str> {
        match kind {
            Kind::Api => self.api_root.as_deref(),
            Kind::Flow => self.flow_root.as_deref(),
            Kind::Model => self.model_root.as_deref(),
            Kind::Plugin => self.plugin_root.as_deref(),
        }
    }

    /// At least one root must be configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        let any_app_root = Kind::ALL.iter().any(|kind| self.app_root(*kind).is_some());
        if self.engine_root.is_none() && !any_app_root {
            return Err(ConfigError::Invalid(
                "no engine or application roots configured".to_string(),
            ));
        }
        Ok(())
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn restart_debounce(&self) -> Duration {
        Duration::from_millis(self.restart_debounce_ms)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, value)))
}
