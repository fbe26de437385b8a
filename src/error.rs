//! Error types for the configuration engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, parsing, or applying configuration sources.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source '{path}' does not exist")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to read config source '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config source '{source_name}': {message}")]
    ParseFailed { source_name: String, message: String },

    #[error("No configurator for root element '{name}'{}", suggestion_hint(.suggestion))]
    UnknownRootElement {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Configurator for root element '{root}' failed: {source}")]
    ApplyFailed {
        root: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid property definition '{0}', expected key=value")]
    InvalidProperty(String),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

/// Errors raised while building the configurator registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Root element '{name}' is registered more than once")]
    DuplicateRootElement { name: String },

    #[error("Type '{type_name}' already has a configurator")]
    DuplicateType { type_name: &'static str },
}

/// Admin endpoint and metrics errors.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Failed to bind admin server to '{addr}': {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Prometheus metrics failed: {0}")]
    Metrics(String),

    #[error("Admin server failed: {0}")]
    Serve(String),
}
