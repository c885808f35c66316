// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::receivers::log_file::error::{Error, Result};

/// IncrementalReader tracks how much of a single file has been consumed and
/// reads only what was appended since the last change.
///
/// The file is opened for each read and closed right after, so an external
/// rotation never leaves us holding a stale handle.
#[derive(Debug)]
pub struct IncrementalReader {
    /// Canonical path of the target file
    path: PathBuf,
    /// Bytes already consumed
    offset: u64,
}

impl IncrementalReader {
    /// Create a reader positioned at the current end of `path`.
    ///
    /// Existing content is skipped on purpose, only lines appended after
    /// startup are ever emitted.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = fs::canonicalize(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(Error::NotAFile(path));
        }

        Ok(Self {
            path,
            offset: metadata.len(),
        })
    }

    /// Get the canonical target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current offset
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether `event_path` refers to the target file.
    pub fn is_target(&self, event_path: &Path) -> bool {
        normalize_path(event_path) == self.path
    }

    /// Handle a modification notification for `event_path`.
    ///
    /// Returns the complete lines appended since the previous call, in file
    /// order. Events for other files, or that carry no new bytes, yield an
    /// empty vector. A file smaller than the current offset is treated as
    /// rotated: the offset is moved to the new end and nothing is read.
    pub fn handle_change(&mut self, event_path: &Path) -> Result<Vec<String>> {
        if !self.is_target(event_path) {
            return Ok(Vec::new());
        }

        let size = fs::metadata(&self.path)?.len();

        if size == self.offset {
            return Ok(Vec::new());
        }

        if size < self.offset {
            info!(
                path = %self.path.display(),
                previous_offset = self.offset,
                size,
                "Log file shrank, assuming rotation"
            );
            self.offset = size;
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;

        let mut buf = Vec::with_capacity((size - self.offset) as usize);
        file.read_to_end(&mut buf)?;

        // The file may have grown since we stat'ed it, trust the cursor.
        let end = file.stream_position()?;
        debug!(from = self.offset, to = end, "Read appended bytes");
        self.offset = end;

        Ok(split_lines(&buf))
    }
}

/// Split raw bytes into lines. A trailing newline does not produce an empty
/// final entry, `\r\n` endings are accepted, and invalid UTF-8 is replaced.
fn split_lines(buf: &[u8]) -> Vec<String> {
    if buf.is_empty() {
        return Vec::new();
    }

    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.split(|b| *b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect()
}

/// Resolve `path` to an absolute canonical path. If the entry no longer
/// exists, resolve its parent and re-attach the file name.
fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => parent.join(name),
            Err(_) => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}
