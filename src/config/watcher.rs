//! Configuration file watcher for hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::GuardConfig;

/// Watches a configuration file and publishes every accepted revision.
///
/// A revision is accepted only if it loads and validates; otherwise the
/// error is logged and the running configuration stays in place. Editors
/// often emit several events per save, so a revision equal to the last
/// accepted one is not republished. Dropping the watcher stops it.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Start watching `path`, seeded with the configuration already in use.
    pub fn start(
        path: &Path,
        current: GuardConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GuardConfig>), notify::Error> {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watched = path.to_path_buf();
        let mut last_accepted = current;

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                let content = match fs::read_to_string(&watched) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::error!(error = %ConfigError::from(e), "Failed to reload config, keeping current configuration");
                        return;
                    }
                };
                // Truncated by a writer that has not written yet.
                if content.trim().is_empty() {
                    tracing::debug!(path = ?watched, "Config file empty, waiting for content");
                    return;
                }
                match parse_config(&content) {
                    Ok(config) if config == last_accepted => {
                        tracing::debug!(path = ?watched, "Config unchanged, skipping reload");
                    }
                    Ok(config) => {
                        tracing::info!(path = ?watched, "Config change accepted");
                        last_accepted = config.clone();
                        if update_tx.send(config).is_err() {
                            tracing::debug!("Config update receiver dropped");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Config watch error"),
        };

        let mut watcher = RecommendedWatcher::new(
            handler,
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok((
            Self {
                path: path.to_path_buf(),
                _watcher: watcher,
            },
            update_rx,
        ))
    }

    /// The file being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
