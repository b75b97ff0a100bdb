//! Configuration file handling
//!
//! The configuration lives at `$DEPOT_CONFIG`, falling back to
//! `<config dir>/depot/config.toml`. A missing file is not an error: it
//! yields the defaults, which register no backends.

use crate::error::ConfigError;
use depot_schema::{BackendId, Category};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the configuration file location.
pub const CONFIG_ENV: &str = "DEPOT_CONFIG";

/// Comma-separated list restricting which configured backends are enabled.
pub const BACKENDS_ENV: &str = "DEPOT_BACKENDS";

/// Knobs of the aggregation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Emission window of aggregated search results, in milliseconds.
    pub stream_debounce_ms: u64,
    /// Streams alive longer than this are logged on completion.
    pub slow_stream_warning_secs: u64,
    /// Backend whose copy wins when several share an appstream id.
    pub current_application_backend: Option<BackendId>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            stream_debounce_ms: 20,
            slow_stream_warning_secs: 5,
            current_application_backend: None,
        }
    }
}

impl ModelSettings {
    /// Debounce window as a [`Duration`].
    pub fn stream_debounce(&self) -> Duration {
        Duration::from_millis(self.stream_debounce_ms)
    }

    /// Slow-stream threshold as a [`Duration`].
    pub fn slow_stream_warning(&self) -> Duration {
        Duration::from_secs(self.slow_stream_warning_secs)
    }
}

fn default_enabled() -> bool {
    true
}

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Stable backend id.
    pub name: String,
    /// Factory that builds it.
    pub kind: String,
    /// Disabled entries are skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Factory specific options.
    #[serde(flatten)]
    pub options: toml::Table,
}

impl BackendSettings {
    /// An enabled backend without options.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            enabled: true,
            options: toml::Table::new(),
        }
    }

    /// Deserialize the factory specific options into `T`.
    pub fn options<T: serde::de::DeserializeOwned>(&self) -> Result<T, toml::de::Error> {
        toml::Value::Table(self.options.clone()).try_into()
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    /// Model settings.
    pub model: ModelSettings,
    /// Backends in registration order.
    pub backends: Vec<BackendSettings>,
    /// Browsing categories.
    pub categories: Vec<Category>,
}

impl DepotConfig {
    /// Default file location.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("depot").join("config.toml"))
    }

    /// Parse configuration text. `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Keep only the named backends enabled. Unknown names are logged.
    pub fn restrict_backends<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            if !self.backends.iter().any(|b| b.name == name.as_ref()) {
                tracing::warn!(backend = name.as_ref(), "Requested backend is not configured");
            }
        }
        for backend in &mut self.backends {
            backend.enabled =
                backend.enabled && names.iter().any(|n| n.as_ref() == backend.name);
        }
    }

    /// Apply `DEPOT_BACKENDS`, if set.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(BACKENDS_ENV) {
            let names = split_backend_list(&value);
            if !names.is_empty() {
                self.restrict_backends(&names);
            }
        }
    }

    /// Enabled backends in registration order.
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendSettings> {
        self.backends.iter().filter(|b| b.enabled)
    }

    /// Depth-first lookup of a category by name.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find_map(|c| c.find(name))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.name.clone()));
            }
        }
        for category in &self.categories {
            category.validate()?;
        }
        Ok(())
    }
}

/// Split a comma-separated backend list, dropping blanks.
pub fn split_backend_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
