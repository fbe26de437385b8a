//! The configuration engine: load cycles and configurator discovery.

pub mod discovery;

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use crate::admin::metrics::Metrics;
use crate::config::{self, Document, PropertySource, SourceRef, SourceResolver};
use crate::configurator::{Configurator, ConfiguratorRegistry};
use crate::error::ConfigError;

/// State published by the last successful load cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    /// Names of the sources applied, in application order.
    pub sources: Vec<String>,
    /// When the last successful cycle completed.
    pub last_loaded: Option<DateTime<Utc>>,
}

/// Summary of one applied source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    /// Display name of the source.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Root elements applied from this source, in document order.
    pub roots: Vec<String>,
    /// SHA-256 digest of the source content.
    pub digest: String,
}

/// Outcome of a successful load cycle.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Identifier of the cycle, also recorded on its log span.
    pub id: Uuid,
    /// Applied sources, in application order.
    pub sources: Vec<SourceSummary>,
    /// Completion time.
    pub loaded_at: DateTime<Utc>,
    /// Time spent in the cycle.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl LoadReport {
    /// Names of the applied sources.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }
}

/// Applies configuration sources through the configurator registry.
///
/// One engine is shared per process. Load cycles are serialized, and their
/// outcome only becomes visible once a cycle has fully succeeded.
pub struct ConfigurationEngine {
    registry: Arc<ConfiguratorRegistry>,
    properties: Arc<dyn PropertySource>,
    resolver: SourceResolver,
    metrics: Option<Arc<Metrics>>,
    cycle: Mutex<()>,
    state: RwLock<EngineState>,
}

impl ConfigurationEngine {
    /// Creates an engine with the default source resolver.
    pub fn new(registry: Arc<ConfiguratorRegistry>, properties: Arc<dyn PropertySource>) -> Self {
        Self {
            registry,
            properties,
            resolver: SourceResolver::default(),
            metrics: None,
            cycle: Mutex::new(()),
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Replaces the source resolver.
    pub fn with_resolver(mut self, resolver: SourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Records load cycles into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs a full load cycle: resolve sources, parse, dispatch every root
    /// element, then publish the new state.
    ///
    /// Any failure aborts the cycle and leaves the published state untouched.
    /// Root elements applied before the failure are not rolled back.
    pub fn configure(&self) -> Result<LoadReport, ConfigError> {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);

        let id = Uuid::new_v4();
        let span = info_span!("load_cycle", %id);
        let _enter = span.enter();
        let started = Instant::now();

        match self.run_cycle() {
            Ok(sources) => {
                let duration = started.elapsed();
                let loaded_at = Utc::now();

                {
                    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                    *state = EngineState {
                        sources: sources.iter().map(|s| s.name.clone()).collect(),
                        last_loaded: Some(loaded_at),
                    };
                }

                if let Some(metrics) = &self.metrics {
                    metrics.record_success(
                        duration.as_secs_f64(),
                        sources.len(),
                        loaded_at.timestamp(),
                    );
                }

                info!(
                    sources = sources.len(),
                    duration_ms = duration.as_millis() as u64,
                    "Configuration loaded"
                );

                Ok(LoadReport {
                    id,
                    sources,
                    loaded_at,
                    duration,
                })
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(started.elapsed().as_secs_f64());
                }
                error!(error = %e, "Configuration load failed, keeping previous state");
                Err(e)
            }
        }
    }

    fn run_cycle(&self) -> Result<Vec<SourceSummary>, ConfigError> {
        let config_path = config::config_path(self.properties.as_ref());
        let sources = self.resolver.resolve(config_path.as_deref())?;

        info!(
            path = config_path.as_deref().unwrap_or(""),
            count = sources.len(),
            "Resolved configuration sources"
        );

        let mut applied = Vec::with_capacity(sources.len());
        for source in &sources {
            applied.push(self.apply_source(source)?);
        }

        Ok(applied)
    }

    fn apply_source(&self, source: &SourceRef) -> Result<SourceSummary, ConfigError> {
        // The file handle is closed before dispatch starts.
        let (document, digest) = source.open()?.into_document()?;

        info!(source = %source.name, roots = document.len(), "Applying configuration source");
        self.configure_document(&document)?;

        Ok(SourceSummary {
            name: source.name.clone(),
            path: source.path.clone(),
            roots: document.keys().into_iter().map(str::to_string).collect(),
            digest,
        })
    }

    /// Dispatches every top-level entry of `document` to its root configurator,
    /// in document order. Stops at the first failure.
    pub fn configure_document(&self, document: &Document) -> Result<(), ConfigError> {
        for (key, value) in document.iter() {
            let configurator = self.registry.lookup_root(key).ok_or_else(|| {
                ConfigError::UnknownRootElement {
                    name: key.to_string(),
                    suggestion: self.registry.suggest_root(key).map(str::to_string),
                }
            })?;

            debug!(root = key, "Dispatching root element");
            configurator
                .configure(value)
                .map_err(|e| ConfigError::ApplyFailed {
                    root: key.to_string(),
                    source: e.into(),
                })?;
        }

        Ok(())
    }

    /// Parses one byte stream and applies it. Published state is not changed.
    pub fn configure_reader<R: Read>(&self, name: &str, reader: R) -> Result<(), ConfigError> {
        let document = Document::from_reader(name, reader)?;
        self.configure_document(&document)
    }

    /// Names of the sources applied by the last successful cycle.
    pub fn sources(&self) -> Vec<String> {
        self.read_state().sources.clone()
    }

    /// Completion time of the last successful cycle.
    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        self.read_state().last_loaded
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> EngineState {
        self.read_state().clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every configurator reachable from the roots, for documentation.
    pub fn configurators(&self) -> Vec<Arc<dyn Configurator>> {
        discovery::discover_all(&self.registry)
    }

    /// Root configurators only, in registration order.
    pub fn root_configurators(&self) -> Vec<Arc<dyn Configurator>> {
        self.registry.roots().to_vec()
    }

    /// The registry this engine dispatches to.
    pub fn registry(&self) -> &ConfiguratorRegistry {
        &self.registry
    }

    /// The configuration path the next cycle would use, resolved against the
    /// default file when blank.
    pub fn effective_path(&self) -> PathBuf {
        match config::config_path(self.properties.as_ref()) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.resolver.default_path().to_path_buf(),
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
