// SPDX-License-Identifier: Apache-2.0

//! Extraction of player events from Minecraft server log lines.
//!
//! Every recognized line carries the server thread prefix, for example:
//!
//! ```text
//! [12:00:00] [Server thread/INFO]: Steve joined the game
//! ```
//!
//! Only the event description after the prefix is kept.

use std::fmt;

use regex::Regex;

use crate::receivers::log_file::error::{Error, Result};

/// Prefix shared by every recognized line: timestamp and server thread log level.
const LINE_PREFIX: &str = r"\[\d\d:\d\d:\d\d\] \[Server thread/INFO\]: ";

/// Player names never start with `<`, which keeps chat text out of the
/// non-chat patterns.
const PLAYER: &str = r"[^\s<]\S*";

/// Event patterns in priority order. Each has exactly one capture group and
/// `{player}` stands for [`PLAYER`].
const EVENT_PATTERNS: &[(EventKind, &str)] = &[
    (EventKind::Left, r"({player} left the game)"),
    (EventKind::Joined, r"({player} joined the game)"),
    (EventKind::Chat, r"(<\S+> .+)"),
    (EventKind::Advancement, r"({player} has made the advancement \[.+\])"),
    (EventKind::Goal, r"({player} has reached the goal \[.+\])"),
    (EventKind::Challenge, r"({player} has completed the challenge \[.+\])"),
];

/// Which pattern produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Left,
    Joined,
    Chat,
    Advancement,
    Goal,
    Challenge,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Left => "left",
            EventKind::Joined => "joined",
            EventKind::Chat => "chat",
            EventKind::Advancement => "advancement",
            EventKind::Goal => "goal",
            EventKind::Challenge => "challenge",
        };
        f.write_str(name)
    }
}

/// A message captured from a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedEvent<'a> {
    pub kind: EventKind,
    pub message: &'a str,
}

/// Fixed, ordered set of event patterns.
pub struct PatternMatcher {
    patterns: Vec<(EventKind, Regex)>,
}

impl PatternMatcher {
    /// Compile the built-in pattern set.
    pub fn new() -> Result<Self> {
        let patterns = EVENT_PATTERNS
            .iter()
            .map(|(kind, body)| {
                let pattern = format!("{}{}", LINE_PREFIX, body.replace("{player}", PLAYER));
                Regex::new(&pattern)
                    .map(|regex| (*kind, regex))
                    .map_err(|e| Error::Regex(format!("invalid {} pattern: {}", kind, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Return the first event found in `line`, trying patterns in priority order.
    pub fn extract<'a>(&self, line: &'a str) -> Option<MatchedEvent<'a>> {
        self.patterns.iter().find_map(|(kind, regex)| {
            regex
                .captures(line)
                .and_then(|caps| caps.get(1))
                .filter(|m| !m.as_str().is_empty())
                .map(|m| MatchedEvent {
                    kind: *kind,
                    message: m.as_str(),
                })
        })
    }

    /// Return only the captured message for `line`.
    pub fn match_line<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.extract(line).map(|event| event.message)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
