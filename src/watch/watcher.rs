// src/watch/watcher.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::engine::Registry;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `config_dir` for per-task `*.json` files and deliver an update to
/// the named task on every create/modify/remove.
///
/// Existing task files are delivered once up front, so tasks configured
/// before the supervisor started come up immediately. A removed file is
/// delivered as an update too; the resulting load failure stops the task
/// and clears its config.
pub fn spawn_watcher(config_dir: impl Into<PathBuf>, registry: Registry) -> Result<WatcherHandle> {
    let dir = config_dir.into();
    let dir = dir.canonicalize().unwrap_or(dir);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("procsit: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("procsit: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("watching config dir {dir:?}");

    // Deliver updates for task files that already exist.
    for entry in fs::read_dir(&dir).with_context(|| format!("reading config dir {dir:?}"))? {
        let path = entry?.path();
        if let Some(name) = task_name_for(&path) {
            debug!(task = %name, path = ?path, "initial task file");
            registry.get_or_create(&name).update(path);
        }
    }

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!("received notify event: {:?}", event);
            for path in &event.paths {
                match task_name_for(path) {
                    Some(name) => {
                        registry.get_or_create(&name).update(path.clone());
                    }
                    None => {
                        warn!("ignoring non-task file change at {path:?}");
                    }
                }
            }
        }
        debug!("config watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Map a changed path to a task name: `<name>.json`, skipping editor
/// droppings (hidden and backup-ish files).
fn task_name_for(path: &Path) -> Option<String> {
    if !path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.starts_with('.') || stem.starts_with('#') {
        return None;
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::task_name_for;
    use std::path::Path;

    #[test]
    fn json_files_map_to_their_stem() {
        assert_eq!(
            task_name_for(Path::new("/etc/procsit/web.json")),
            Some("web".to_string())
        );
        assert_eq!(
            task_name_for(Path::new("config/db-proxy.JSON")),
            Some("db-proxy".to_string())
        );
    }

    #[test]
    fn non_task_files_are_ignored() {
        assert_eq!(task_name_for(Path::new("config/notes.txt")), None);
        assert_eq!(task_name_for(Path::new("config/.web.json")), None);
        assert_eq!(task_name_for(Path::new("config/#web.json#")), None);
        assert_eq!(task_name_for(Path::new("config/web")), None);
    }
}
