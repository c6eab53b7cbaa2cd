//! Configuration file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::EngineConfig;

/// Watches the config file and sends each validated revision.
///
/// Editors often emit several events per save; a revision whose bytes equal
/// the last one sent is dropped.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<EngineConfig>,
    last_content: Arc<Mutex<Option<String>>>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<EngineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let initial = std::fs::read_to_string(path).ok();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
                last_content: Arc::new(Mutex::new(initial)),
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let last_content = self.last_content.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    if let Some(config) = reload(&path, &last_content) {
                        let _ = tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Read and validate the file; `None` when unchanged or invalid.
fn reload(path: &Path, last_content: &Mutex<Option<String>>) -> Option<EngineConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read config, keeping current");
            return None;
        }
    };

    let mut last = last_content.lock();
    if last.as_deref() == Some(content.as_str()) {
        return None;
    }

    match parse_config(&content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), watches = config.watch.len(), "Config reloaded");
            *last = Some(content);
            Some(config)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid config, keeping current");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reload_skips_unchanged_and_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[cache]\nsuccess_ttl_secs = 600\n").unwrap();
        let last = Mutex::new(None);

        let first = reload(file.path(), &last).unwrap();
        assert_eq!(first.cache.success_ttl_secs, 600);
        assert!(reload(file.path(), &last).is_none());

        write!(file, "this is = = not toml").unwrap();
        assert!(reload(file.path(), &last).is_none());
    }
}
