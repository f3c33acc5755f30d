//! Directory watching.
//!
//! Each directory gets its own non-recursive watch so directories created
//! later can be picked up one at a time and skipped directories never cost a
//! watch. Directories are deduplicated by canonical path, so symlink loops and
//! repeated registration are no-ops. A removed directory must be forgotten
//! before a directory recreated at the same path can be watched again.

use super::classify::is_ignored_dir;
use crate::error::{Error, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Watches a directory tree, one directory at a time.
pub struct DirWatcher {
    root: PathBuf,
    watcher: Mutex<RecommendedWatcher>,
    watched: Mutex<HashSet<PathBuf>>,
}

impl std::fmt::Debug for DirWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirWatcher")
            .field("root", &self.root)
            .field("watched", &self.watched_count())
            .finish_non_exhaustive()
    }
}

impl DirWatcher {
    /// Create a watcher and start watching `root` recursively.
    ///
    /// Raw events are delivered on the returned channel.
    pub fn start(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<Event>)> {
        let root = dunce::canonicalize(root)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        debug!("Watch event receiver dropped");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Watch error");
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::Watch {
            path: root.clone(),
            message: e.to_string(),
        })?;

        let this = Self {
            root: root.clone(),
            watcher: Mutex::new(watcher),
            watched: Mutex::new(HashSet::new()),
        };
        let count = this.watch_tree(&root);
        debug!(root = %root.display(), directories = count, "Watching directory tree");
        Ok((this, rx))
    }

    /// Canonical root of the watched tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Watch `dir` and every non-ignored directory below it.
    ///
    /// Returns how many directories were newly registered. A directory that
    /// cannot be watched is logged and its subtree skipped.
    pub fn watch_tree(&self, dir: &Path) -> usize {
        let mut added = 0;
        let mut stack = vec![dir.to_path_buf()];

        while let Some(dir) = stack.pop() {
            match self.watch_dir(&dir) {
                Ok(true) => added += 1,
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "Directory skipped");
                    continue;
                }
            }

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot list directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                    || entry.path().is_dir();
                if is_dir && !is_ignored_dir(&entry.file_name()) {
                    stack.push(entry.path());
                }
            }
        }

        added
    }

    /// Register a single directory. `Ok(false)` means it was already watched.
    fn watch_dir(&self, dir: &Path) -> Result<bool> {
        let real = dunce::canonicalize(dir).map_err(|e| Error::Watch {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
        if watched.contains(&real) {
            return Ok(false);
        }

        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .watch(&real, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch {
                path: real.clone(),
                message: e.to_string(),
            })?;
        watched.insert(real);
        Ok(true)
    }

    /// Drop `dir` and every watched directory below it.
    ///
    /// `dir` is matched as reported by the watcher, since a removed directory
    /// can no longer be canonicalized. Returns how many entries were dropped.
    pub fn forget(&self, dir: &Path) -> usize {
        let mut watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
        let gone: Vec<PathBuf> = watched
            .iter()
            .filter(|path| path.starts_with(dir))
            .cloned()
            .collect();
        if gone.is_empty() {
            return 0;
        }

        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        for path in &gone {
            watched.remove(path);
            // The kernel usually dropped the watch with the directory.
            if let Err(e) = watcher.unwatch(path) {
                debug!(dir = %path.display(), error = %e, "Unwatch skipped");
            }
        }
        debug!(dir = %dir.display(), directories = gone.len(), "Forgot removed directories");
        gone.len()
    }

    /// Whether `dir` (by canonical path) is being watched.
    #[must_use]
    pub fn is_watching(&self, dir: &Path) -> bool {
        dunce::canonicalize(dir).is_ok_and(|real| {
            self.watched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&real)
        })
    }

    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
