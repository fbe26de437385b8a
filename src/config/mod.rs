//! Configuration path resolution, source loading, and hot-reload.

pub mod hot_reload;
pub mod loader;

use std::collections::HashMap;

use crate::error::ConfigError;
pub use loader::{ConfigSource, Document, SourceRef, SourceResolver};

/// Property naming the configuration path. Takes precedence over [`CONFIG_ENV`].
pub const CONFIG_PROPERTY: &str = "casc.config";

/// Environment variable naming the configuration path.
pub const CONFIG_ENV: &str = "CASC_CONFIG";

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./casc.yaml";

/// Lookup of process-level settings the engine reads on every load cycle.
pub trait PropertySource: Send + Sync {
    /// Returns a system-level property, if defined.
    fn property(&self, key: &str) -> Option<String>;

    /// Returns an environment variable, if defined.
    fn env(&self, key: &str) -> Option<String>;
}

/// Resolves the effective configuration path.
///
/// A defined property wins over the environment variable, even when blank.
/// `None` (or a blank string) selects the default file.
pub fn config_path(properties: &dyn PropertySource) -> Option<String> {
    properties
        .property(CONFIG_PROPERTY)
        .or_else(|| properties.env(CONFIG_ENV))
}

/// Properties defined on the command line, backed by the real process environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessProperties {
    properties: HashMap<String, String>,
}

impl ProcessProperties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` definitions, as passed with `-D`.
    pub fn from_definitions<S: AsRef<str>>(definitions: &[S]) -> Result<Self, ConfigError> {
        let mut properties = HashMap::new();
        for definition in definitions {
            let definition = definition.as_ref();
            let (key, value) = definition
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| ConfigError::InvalidProperty(definition.to_string()))?;
            properties.insert(key.trim().to_string(), value.to_string());
        }
        Ok(Self { properties })
    }
}

impl PropertySource for ProcessProperties {
    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory properties and environment, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedProperties {
    properties: HashMap<String, String>,
    env: HashMap<String, String>,
}

impl FixedProperties {
    /// Creates an empty set: no properties, empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Defines an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Shorthand for a set whose configuration path property is `path`.
    pub fn config_path(path: impl Into<String>) -> Self {
        Self::new().with_property(CONFIG_PROPERTY, path)
    }
}

impl PropertySource for FixedProperties {
    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn env(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }
}
