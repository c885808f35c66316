// SPDX-License-Identifier: Apache-2.0

//! Polling-based watcher for file systems where native notifications are
//! unavailable or unreliable (NFS, some container mounts).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::traits::{FileEvent, FileWatcher, WatcherError};

/// What we remember about a file between scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    size: u64,
}

type Snapshot = HashMap<PathBuf, FileStamp>;

/// Periodically scans the watched directories and reports differences
/// between consecutive scans as events.
pub struct PollWatcher {
    dirs: Vec<PathBuf>,
    files: Snapshot,
    poll_interval: Duration,
    last_poll: Instant,
}

impl PollWatcher {
    pub fn new(directories: &[&Path], poll_interval: Duration) -> Result<Self, WatcherError> {
        let mut watcher = Self {
            dirs: directories.iter().map(|p| p.to_path_buf()).collect(),
            files: HashMap::new(),
            poll_interval,
            last_poll: Instant::now(),
        };

        // Baseline, so files that already exist are not reported as created
        watcher.files = watcher.snapshot();

        Ok(watcher)
    }

    fn snapshot(&self) -> Snapshot {
        let mut snapshot = HashMap::with_capacity(self.files.len());

        for dir in &self.dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("Error scanning directory {:?}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let metadata = match entry.metadata() {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };

                snapshot.insert(
                    entry.path(),
                    FileStamp {
                        modified: metadata.modified().ok(),
                        size: metadata.len(),
                    },
                );
            }
        }

        snapshot
    }

    /// Rescan and return the changes since the previous scan.
    fn scan(&mut self) -> Vec<FileEvent> {
        let current = self.snapshot();
        let mut events = Vec::new();

        for (path, stamp) in &current {
            match self.files.get(path) {
                None => events.push(FileEvent::create(path.clone())),
                Some(prev) if prev != stamp => events.push(FileEvent::modify(path.clone())),
                Some(_) => {}
            }
        }

        for path in self.files.keys() {
            if !current.contains_key(path) {
                events.push(FileEvent::remove(path.clone()));
            }
        }

        self.files = current;
        self.last_poll = Instant::now();

        events
    }
}

impl FileWatcher for PollWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError> {
        if !fs::metadata(path)?.is_dir() {
            return Err(WatcherError::Watch(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        if !self.dirs.iter().any(|d| d == path) {
            self.dirs.push(path.to_path_buf());
            self.files = self.snapshot();
        }
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.dirs.retain(|d| d != path);
        self.files.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<FileEvent>, WatcherError> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.last_poll.elapsed() >= self.poll_interval {
                let events = self.scan();
                if !events.is_empty() {
                    return Ok(events);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            // Sleep until next poll or timeout, whichever is sooner
            let next_poll = self.poll_interval.saturating_sub(self.last_poll.elapsed());
            let sleep_for = next_poll.min(deadline - now);
            if !sleep_for.is_zero() {
                std::thread::sleep(sleep_for);
            }
        }
    }

    fn is_native(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}
