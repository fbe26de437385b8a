//! Configuration hot-reload functionality.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::engine::ConfigurationEngine;

/// Watches the configuration sources and re-runs the engine on changes.
pub struct ConfigWatcher {
    engine: Arc<ConfigurationEngine>,
    reload_tx: mpsc::Sender<ConfigReloadEvent>,
    debounce: Duration,
}

/// Events emitted by the configuration watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigReloadEvent {
    /// Configuration was successfully reloaded from these sources.
    Reloaded { sources: Vec<String> },
    /// The reload failed; the previous configuration stays published.
    Failed { error: String },
}

impl ConfigWatcher {
    /// Creates a new configuration watcher.
    pub fn new(
        engine: Arc<ConfigurationEngine>,
        reload_tx: mpsc::Sender<ConfigReloadEvent>,
    ) -> Self {
        Self {
            engine,
            reload_tx,
            debounce: Duration::from_millis(500),
        }
    }

    /// Overrides how long change bursts are coalesced before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Starts watching the effective configuration path.
    ///
    /// Directories are watched recursively. A single file is watched through
    /// its parent directory so that editors replacing the file are noticed.
    pub async fn start(self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;

        let target = self.engine.effective_path();
        let (watch_path, mode) = watch_target(&target);
        watcher.watch(&watch_path, mode)?;

        tracing::info!(path = ?watch_path, ?mode, "Watching configuration for changes");

        // The watcher must outlive the handler task.
        tokio::spawn(async move {
            let _watcher = watcher;
            self.handle_changes(rx, target).await;
        });

        Ok(())
    }

    /// Handles file change events with debouncing.
    async fn handle_changes(self, mut rx: mpsc::UnboundedReceiver<Event>, target: PathBuf) {
        while let Some(event) = rx.recv().await {
            if !is_relevant(&event, &target) {
                continue;
            }

            // Wait for the writer to finish, then swallow the rest of the burst.
            tokio::time::sleep(self.debounce).await;
            while rx.try_recv().is_ok() {}

            let event = self.try_reload().await;
            match &event {
                ConfigReloadEvent::Reloaded { sources } => {
                    tracing::info!(?sources, "Configuration reloaded successfully");
                }
                ConfigReloadEvent::Failed { error } => {
                    tracing::error!(%error, "Configuration reload failed");
                }
            }

            if self.reload_tx.send(event).await.is_err() {
                break;
            }
        }

        tracing::warn!("Config watcher channel closed");
    }

    /// Runs one load cycle on a blocking thread.
    async fn try_reload(&self) -> ConfigReloadEvent {
        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.configure()).await {
            Ok(Ok(report)) => ConfigReloadEvent::Reloaded {
                sources: report.source_names(),
            },
            Ok(Err(e)) => ConfigReloadEvent::Failed {
                error: e.to_string(),
            },
            Err(e) => ConfigReloadEvent::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Chooses what to hand to the OS watcher for a configuration path.
fn watch_target(path: &Path) -> (PathBuf, RecursiveMode) {
    if path.is_dir() {
        return (path.to_path_buf(), RecursiveMode::Recursive);
    }

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    (parent.to_path_buf(), RecursiveMode::NonRecursive)
}

/// Returns true when the event may change the configuration at `target`.
fn is_relevant(event: &Event, target: &Path) -> bool {
    if event.kind.is_access() {
        return false;
    }

    if target.is_dir() {
        return event.paths.iter().any(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| super::loader::RECOGNIZED_EXTENSIONS.contains(&e))
        });
    }

    let file_name = target.file_name();
    event
        .paths
        .iter()
        .any(|p| file_name.is_some() && p.file_name() == file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, EventKind, ModifyKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn single_file_is_watched_through_its_parent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("casc.yaml");

        let (path, mode) = watch_target(&file);
        assert_eq!(path, dir.path());
        assert_eq!(mode, RecursiveMode::NonRecursive);

        let (path, _) = watch_target(Path::new("casc.yaml"));
        assert_eq!(path, Path::new("."));
    }

    #[test]
    fn directories_are_watched_recursively() {
        let dir = TempDir::new().unwrap();
        let (path, mode) = watch_target(dir.path());
        assert_eq!(path, dir.path());
        assert_eq!(mode, RecursiveMode::Recursive);
    }

    #[test]
    fn file_events_match_on_file_name() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("casc.yaml");

        let modify = || EventKind::Modify(ModifyKind::Any);
        assert!(is_relevant(&event(modify(), &target), &target));
        assert!(!is_relevant(&event(modify(), &dir.path().join("other.yaml")), &target));
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), &target),
            &target
        ));
    }

    #[test]
    fn directory_events_match_on_extension() {
        let dir = TempDir::new().unwrap();
        let create = || EventKind::Create(CreateKind::File);

        assert!(is_relevant(&event(create(), &dir.path().join("new.yml")), dir.path()));
        assert!(!is_relevant(&event(create(), &dir.path().join("notes.txt")), dir.path()));
    }
}
