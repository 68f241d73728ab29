//! Telegram encoding and decoding for the Lutron integration protocol.
//!
//! Telegrams are comma-separated ASCII lines:
//! ```text
//! #OUTPUT,<id>,<action>,<level>\r\n   set an output (host -> controller)
//! ?OUTPUT,<id>\r\n                     query an output (host -> controller)
//! ~OUTPUT,<id>,1,<level>\n             level report (controller -> host)
//! ```
//!
//! Inbound decoding never fails loudly: the line is shared with other
//! traffic and partial reads happen, so anything that is not a well-formed
//! level report is simply `None`.

use std::fmt;

use bytes::Bytes;
use serde::Deserialize;

/// Command prefix for setting an output.
pub const SET_PREFIX: &str = "#OUTPUT";

/// Command prefix for querying an output.
pub const QUERY_PREFIX: &str = "?OUTPUT";

/// Report prefix for output state sent by the controller.
pub const REPORT_PREFIX: &str = "~OUTPUT";

/// Action number for "set/report zone level".
pub const ACTION_LEVEL: u8 = 1;

/// Line terminator for outbound telegrams.
pub const LINE_ENDING: &str = "\r\n";

/// Prompts the controller may print in front of a report.
const PROMPTS: [&str; 2] = ["GNET> ", "QNET> "];

/// Integration id of an output, assigned by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for OutputId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Telegram kinds understood by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramKind {
    /// An `OUTPUT` telegram (dimmer level or shade position).
    Output,
}

/// A decoded telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    /// Telegram kind.
    pub kind: TelegramKind,
    /// Output the telegram refers to.
    pub id: OutputId,
    /// Action number (always [`ACTION_LEVEL`] for decoded reports).
    pub action: u8,
    /// Reported level, as sent on the wire.
    pub level: i32,
}

/// Encodes a set-output telegram.
///
/// Values are passed through unchanged; the controller is the authority on
/// range.
#[must_use]
pub fn encode_output(id: OutputId, action: u8, value: i32) -> Bytes {
    Bytes::from(format!("{SET_PREFIX},{id},{action},{value}{LINE_ENDING}"))
}

/// Encodes a query-output telegram.
#[must_use]
pub fn encode_query(id: OutputId) -> Bytes {
    Bytes::from(format!("{QUERY_PREFIX},{id}{LINE_ENDING}"))
}

/// Decodes one received line into a level report.
///
/// Returns `None` unless the line has exactly four fields, starts with
/// `~OUTPUT`, carries action `1`, and both the id and the level parse as
/// integers.
#[must_use]
pub fn decode(line: &[u8]) -> Option<Telegram> {
    let line = std::str::from_utf8(line).ok()?.trim();
    let line = PROMPTS
        .iter()
        .find_map(|prompt| line.strip_prefix(prompt))
        .unwrap_or(line);

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [kind, id, action, level] = fields.as_slice() else {
        return None;
    };

    if *kind != REPORT_PREFIX || *action != "1" {
        return None;
    }

    let id = id.parse::<u32>().ok()?;
    let level = level.parse::<i32>().ok()?;

    Some(Telegram {
        kind: TelegramKind::Output,
        id: OutputId(id),
        action: ACTION_LEVEL,
        level,
    })
}
