// SPDX-License-Identifier: Apache-2.0

//! Watch loop for the target log file.
//!
//! The directory containing the target is watched rather than the file
//! itself, so servers and editors that replace the file by rename are still
//! followed. Every content-changing event is handed to a [`ChangeHandler`]
//! on a dedicated blocking thread, which keeps file I/O off the tokio
//! runtime and gives the handler exclusive ownership of the read offset.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, info, warn};

use crate::receivers::log_file::error::{Error, Result};
use crate::receivers::log_file::relay::ChangeHandler;
use crate::receivers::log_file::watcher::{
    BoxedWatcher, FileWatcher, PollWatcher, WatcherConfig, create_watcher,
};

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct LogFileReceiverConfig {
    /// Canonical path of the file to follow
    pub path: PathBuf,
    /// Watcher backend selection
    pub watcher: WatcherConfig,
    /// How long to block waiting for events before checking for cancellation
    pub recv_timeout: Duration,
    /// How long watcher errors may persist before switching to polling
    pub max_watcher_error_duration: Duration,
}

impl LogFileReceiverConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watcher: WatcherConfig::default(),
            recv_timeout: Duration::from_secs(1),
            max_watcher_error_duration: Duration::from_secs(5),
        }
    }

    pub fn with_watcher(mut self, watcher: WatcherConfig) -> Self {
        self.watcher = watcher;
        self
    }

    /// Directory that is subscribed to for change notifications.
    pub fn watch_dir(&self) -> Result<PathBuf> {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::NotAFile(self.path.clone()))
    }
}

pub struct LogFileReceiver {
    config: LogFileReceiverConfig,
}

impl LogFileReceiver {
    pub fn new(config: LogFileReceiverConfig) -> Self {
        Self { config }
    }

    /// Create the watcher and spawn the watch loop onto `task_set`.
    ///
    /// Watcher creation happens here so that a broken backend fails startup
    /// rather than a background task.
    pub fn start<H>(
        self,
        handler: H,
        task_set: &mut JoinSet<std::result::Result<(), BoxError>>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        H: ChangeHandler + Send + 'static,
    {
        let dir = self.config.watch_dir()?;
        let watcher = create_watcher(&self.config.watcher, &[dir.as_path()])?;
        info!(
            path = %self.config.path.display(),
            backend = watcher.backend_name(),
            native = watcher.is_native(),
            "Log file watcher initialized"
        );

        let watch_loop = WatchLoop::new(self.config, watcher, handler)?;
        let cancel = cancel.clone();
        task_set.spawn_blocking(move || watch_loop.run(cancel).map_err(|e| e.into()));

        Ok(())
    }
}

/// Runs until cancelled, dispatching change events to the handler.
pub struct WatchLoop<H> {
    config: LogFileReceiverConfig,
    dir: PathBuf,
    watcher: BoxedWatcher,
    handler: H,
    watcher_first_error: Option<Instant>,
}

impl<H: ChangeHandler> WatchLoop<H> {
    pub fn new(config: LogFileReceiverConfig, watcher: BoxedWatcher, handler: H) -> Result<Self> {
        let dir = config.watch_dir()?;
        Ok(Self {
            config,
            dir,
            watcher,
            handler,
            watcher_first_error: None,
        })
    }

    pub fn run(mut self, cancel: CancellationToken) -> Result<()> {
        self.watcher.watch(&self.dir)?;

        let result = self.watch_until_cancelled(&cancel);

        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!("Failed to unwatch {}: {}", self.dir.display(), e);
        }
        // Dropping the watcher joins the backend's notification thread
        drop(self.watcher);

        info!("Log file watcher stopped");
        result
    }

    fn watch_until_cancelled(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                debug!("Cancellation received, stopping watch loop");
                return Ok(());
            }

            match self.watcher.recv_timeout(self.config.recv_timeout) {
                Ok(events) => {
                    if self.watcher_first_error.take().is_some() {
                        debug!("Watcher recovered after previous errors");
                    }

                    for event in events.iter().filter(|e| e.kind.is_content_change()) {
                        for path in &event.paths {
                            if !self.dispatch(path, cancel)? {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    self.handle_watcher_error(e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    /// Hand one path to the handler, returning whether the loop should keep
    /// going. Read errors are logged and skipped. A closed delivery channel
    /// ends the loop, and is only an error when shutdown was not requested.
    fn dispatch(&mut self, path: &Path, cancel: &CancellationToken) -> Result<bool> {
        match self.handler.on_modified(path) {
            Ok(()) => Ok(true),
            Err(Error::ChannelSend) if cancel.is_cancelled() => {
                debug!("Delivery channel closed during shutdown, stopping watch loop");
                Ok(false)
            }
            Err(Error::ChannelSend) => {
                warn!("Delivery channel closed, stopping watch loop");
                Err(Error::ChannelSend)
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to process change: {}", e);
                Ok(true)
            }
        }
    }

    fn handle_watcher_error(&mut self, e: impl std::fmt::Display) {
        let first_error = *self.watcher_first_error.get_or_insert_with(Instant::now);
        let error_duration = first_error.elapsed();

        if error_duration < self.config.max_watcher_error_duration {
            warn!(
                "Watcher error (errors started {:?} ago): {}",
                error_duration, e
            );
            return;
        }

        warn!(
            "Watcher errors persisted for {:?}, falling back to polling mode: {}",
            error_duration, e
        );
        match PollWatcher::new(&[self.dir.as_path()], self.config.watcher.poll_interval) {
            Ok(poll_watcher) => {
                self.watcher = Box::new(poll_watcher);
                self.watcher_first_error = None;
                info!("Switched to polling mode");
            }
            Err(poll_err) => {
                // Keep the current watcher, retry on the next error
                error!("Failed to create poll watcher: {}", poll_err);
            }
        }
    }
}
