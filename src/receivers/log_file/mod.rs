// SPDX-License-Identifier: Apache-2.0

//! Log file receiver for a single Minecraft server log.
//!
//! Watches the directory containing the log, reads lines as they are
//! appended, and extracts player events (joins, leaves, chat, advancements)
//! from them.
//!
//! Features:
//! - Only content appended after startup is read
//! - Truncation is treated as log rotation and resynchronizes the offset
//! - Native file system notifications with a polling fallback

pub mod error;
pub mod matcher;
pub mod reader;
pub mod receiver;
pub mod relay;
pub mod watcher;

pub use error::{Error, Result};
pub use matcher::{EventKind, MatchedEvent, PatternMatcher};
pub use reader::IncrementalReader;
pub use receiver::{LogFileReceiver, LogFileReceiverConfig, WatchLoop};
pub use relay::{ChangeHandler, MessageSink, Relay};
pub use watcher::{FileWatcher, WatchMode, WatcherConfig};
