// SPDX-License-Identifier: Apache-2.0

//! File system watcher abstractions for the log file receiver.
//!
//! Two strategies are available:
//! - **Native watching**: OS-level notifications (inotify, FSEvents,
//!   ReadDirectoryChangesW) through the `notify` crate.
//! - **Poll watching**: periodic directory scans, for environments where
//!   native watching isn't available or reliable (e.g., NFS).
//!
//! `auto` mode attempts native watching first and falls back to polling.

mod native;
mod poll;
mod traits;

pub use native::NativeWatcher;
pub use poll::PollWatcher;
pub use traits::{FileEvent, FileEventKind, FileWatcher, WatcherError};

use std::path::Path;
use std::time::Duration;

/// A watcher that can be moved onto the coordinator thread.
pub type BoxedWatcher = Box<dyn FileWatcher + Send>;

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Try native watching first, fall back to polling on failure.
    #[default]
    Auto,
    /// Force native file system watching. Fails if unsupported.
    Native,
    /// Force polling mode.
    Poll,
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Watch mode: auto, native, or poll
    pub mode: WatchMode,
    /// Scan interval when polling
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Create a watcher based on the configuration.
///
/// `directories` seeds the poll watcher; the native watcher is given its
/// directories through [`FileWatcher::watch`].
pub fn create_watcher(
    config: &WatcherConfig,
    directories: &[&Path],
) -> Result<BoxedWatcher, WatcherError> {
    match config.mode {
        WatchMode::Native => Ok(Box::new(NativeWatcher::new()?)),
        WatchMode::Poll => Ok(Box::new(PollWatcher::new(
            directories,
            config.poll_interval,
        )?)),
        WatchMode::Auto => match NativeWatcher::new() {
            Ok(watcher) => {
                tracing::info!("Using native file system watcher");
                Ok(Box::new(watcher))
            }
            Err(e) => {
                tracing::warn!(
                    "Native file watching unavailable ({}), falling back to polling",
                    e
                );
                Ok(Box::new(PollWatcher::new(
                    directories,
                    config.poll_interval,
                )?))
            }
        },
    }
}
