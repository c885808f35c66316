// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

use crate::receivers::log_file::watcher::WatcherError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{}' does not exist.", .0.display())]
    FileNotFound(PathBuf),

    #[error("'{}' is not a regular file.", .0.display())]
    NotAFile(PathBuf),

    #[error("Regex error: {0}")]
    Regex(String),

    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("Channel send error")]
    ChannelSend,
}

pub type Result<T> = std::result::Result<T, Error>;
