// SPDX-License-Identifier: Apache-2.0

//! Glue between change notifications and delivery: reads appended lines,
//! extracts events and forwards the messages in file order.

use std::path::Path;

use tracing::debug;

use crate::bounded_channel::BoundedSender;
use crate::receivers::log_file::error::{Error, Result};
use crate::receivers::log_file::matcher::PatternMatcher;
use crate::receivers::log_file::reader::IncrementalReader;

/// Sink for change notifications coming out of the watch loop.
///
/// Any `FnMut(&Path) -> Result<()>` closure is a handler as well.
pub trait ChangeHandler {
    /// Called for every path reported by a content-changing event in the
    /// watched directory, including paths that are not the target file.
    fn on_modified(&mut self, path: &Path) -> Result<()>;
}

impl<F> ChangeHandler for F
where
    F: FnMut(&Path) -> Result<()>,
{
    fn on_modified(&mut self, path: &Path) -> Result<()> {
        self(path)
    }
}

/// Destination for matched messages.
pub trait MessageSink {
    fn send(&mut self, message: String) -> Result<()>;
}

impl MessageSink for BoundedSender<String> {
    fn send(&mut self, message: String) -> Result<()> {
        self.send_blocking(message).map_err(|_| Error::ChannelSend)
    }
}

impl MessageSink for Vec<String> {
    fn send(&mut self, message: String) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// Reads new lines from the target file on every change and forwards each
/// matched message, in line order, to the sink.
pub struct Relay<S> {
    reader: IncrementalReader,
    matcher: PatternMatcher,
    sink: S,
}

impl<S: MessageSink> Relay<S> {
    pub fn new(reader: IncrementalReader, matcher: PatternMatcher, sink: S) -> Self {
        Self {
            reader,
            matcher,
            sink,
        }
    }

    pub fn reader(&self) -> &IncrementalReader {
        &self.reader
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Handle one change notification, returning how many messages were
    /// forwarded.
    pub fn handle_change(&mut self, path: &Path) -> Result<usize> {
        let lines = self.reader.handle_change(path)?;
        let mut forwarded = 0;

        for line in &lines {
            if let Some(event) = self.matcher.extract(line) {
                debug!(kind = %event.kind, message = event.message, "Matched log event");
                self.sink.send(event.message.to_string())?;
                forwarded += 1;
            }
        }

        if !lines.is_empty() {
            debug!(
                lines = lines.len(),
                forwarded,
                offset = self.reader.offset(),
                "Processed appended lines"
            );
        }

        Ok(forwarded)
    }
}

impl<S: MessageSink> ChangeHandler for Relay<S> {
    fn on_modified(&mut self, path: &Path) -> Result<()> {
        self.handle_change(path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf, Relay<Vec<String>>) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latest.log");
        fs::write(&path, "[11:59:59] [Server thread/INFO]: Done (3.2s)!\n").unwrap();

        let reader = IncrementalReader::new(&path).unwrap();
        let relay = Relay::new(reader, PatternMatcher::new().unwrap(), Vec::new());
        (temp_dir, path, relay)
    }

    fn append(path: &Path, content: &str) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_relay_forwards_matches_in_order() {
        let (_dir, path, mut relay) = setup();

        append(
            &path,
            "[12:00:00] [Server thread/INFO]: Steve joined the game\n\
             [12:00:01] [Server thread/INFO]: Preparing spawn area: 83%\n\
             [12:00:02] [Server thread/INFO]: <Steve> hi\n\
             [12:00:03] [Server thread/INFO]: Steve left the game\n",
        );

        assert_eq!(relay.handle_change(&path).unwrap(), 3);
        assert_eq!(
            relay.sink(),
            &vec![
                "Steve joined the game".to_string(),
                "<Steve> hi".to_string(),
                "Steve left the game".to_string(),
            ]
        );
    }

    #[test]
    fn test_relay_skips_unmatched_lines() {
        let (_dir, path, mut relay) = setup();

        append(
            &path,
            "[12:00:00] [Server thread/INFO]: Alex joined the game\n\
             not a server line at all\n",
        );

        assert_eq!(relay.handle_change(&path).unwrap(), 1);
        assert_eq!(relay.sink(), &vec!["Alex joined the game".to_string()]);
    }

    #[test]
    fn test_relay_ignores_other_files() {
        let (dir, path, mut relay) = setup();
        let other = dir.path().join("other.log");
        fs::write(&other, "[12:00:00] [Server thread/INFO]: Steve joined the game\n").unwrap();

        assert_eq!(relay.handle_change(&other).unwrap(), 0);
        assert!(relay.sink().is_empty());
        assert_eq!(relay.reader().offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_relay_channel_sink() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latest.log");
        fs::write(&path, "").unwrap();

        let (tx, rx) = bounded::<String>(10);
        let mut relay = Relay::new(
            IncrementalReader::new(&path).unwrap(),
            PatternMatcher::new().unwrap(),
            tx,
        );

        append(&path, "[12:00:00] [Server thread/INFO]: Steve joined the game\n");
        relay.on_modified(&path).unwrap();

        assert_eq!(rx.try_recv(), Some("Steve joined the game".to_string()));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_relay_closed_channel_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latest.log");
        fs::write(&path, "").unwrap();

        let (tx, rx) = bounded::<String>(10);
        drop(rx);
        let mut relay = Relay::new(
            IncrementalReader::new(&path).unwrap(),
            PatternMatcher::new().unwrap(),
            tx,
        );

        append(&path, "[12:00:00] [Server thread/INFO]: Steve joined the game\n");
        assert!(matches!(
            relay.on_modified(&path),
            Err(Error::ChannelSend)
        ));
    }

    #[test]
    fn test_closure_is_a_change_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = |p: &Path| -> Result<()> {
                seen.push(p.to_path_buf());
                Ok(())
            };
            handler.on_modified(Path::new("/tmp/latest.log")).unwrap();
        }
        assert_eq!(seen, vec![std::path::PathBuf::from("/tmp/latest.log")]);
    }
}
