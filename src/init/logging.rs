// SPDX-License-Identifier: Apache-2.0

use tracing::Level;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::fmt::writer::{MakeWriterExt, OrElse, WithMaxLevel};

pub type LogWriter = OrElse<WithMaxLevel<NonBlocking>, NonBlocking>;

/// Send WARN and ERROR records to `stderr` and everything else to `stdout`.
pub fn split_by_level(stdout: NonBlocking, stderr: NonBlocking) -> LogWriter {
    stderr.with_max_level(Level::WARN).or_else(stdout)
}
