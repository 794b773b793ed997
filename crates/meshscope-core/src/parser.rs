//! Telemetry line parsing.
//!
//! The leader prints one line per received message, e.g.
//!
//! ```text
//! Received from fd58:47f8:cd8:54c4:0:ff:fe00:1c01 : temp=21.5
//! ```
//!
//! [`parse`] pulls the sender address and the message text out of such a
//! line. A message starting with `simulate:<id>` is re-attributed to a
//! synthetic node so one physical device can stand in for many.

use std::sync::LazyLock;

use meshscope_types::NodeAddress;
use regex::Regex;

/// Sender and message: `from <addr>`, a non-greedy delimiter, one space,
/// then the message to end of line.
const LINE_PATTERN: &str = r"from ([0-9a-f:]+).*? (.+)$";

/// The simulation directive, either at the head of the message or after
/// one leading framing word left over by the delimiter.
const SIMULATE_PATTERN: &str = r"(?i)^(?:\S+\s+)??simulate:([^\s:]+)\S*\s+(.+)$";

/// Compiled line regex (`None` only if the pattern were invalid).
static LINE_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(LINE_PATTERN).ok());

/// Compiled directive regex (`None` only if the pattern were invalid).
static SIMULATE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(SIMULATE_PATTERN).ok());

/// A recognized telemetry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Effective sender, synthetic for simulated nodes.
    pub address: NodeAddress,
    /// Effective message text.
    pub message: String,
    /// Whether the simulation directive remapped the sender.
    pub simulated: bool,
}

/// Decode raw transport bytes into a trimmed line.
///
/// Invalid UTF-8 sequences are dropped rather than replaced.
pub fn decode_line(bytes: &[u8]) -> String {
    let decoded: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
    decoded.trim().to_owned()
}

/// Extract sender and message from a telemetry line.
///
/// Returns `None` for lines that do not carry a `from <address>` report.
pub fn parse(line: &str) -> Option<ParsedLine> {
    let captures = LINE_REGEX.as_ref()?.captures(line)?;
    let address = captures.get(1)?.as_str();
    let message = captures.get(2)?.as_str().trim();

    if let Some((id, rest)) = simulate_directive(message) {
        return Some(ParsedLine {
            address: NodeAddress::simulated(id),
            message: rest.to_owned(),
            simulated: true,
        });
    }

    Some(ParsedLine {
        address: NodeAddress::new(address),
        message: message.to_owned(),
        simulated: false,
    })
}

/// Split `simulate:<id> <rest>` into `(id, rest)`.
fn simulate_directive(message: &str) -> Option<(&str, &str)> {
    let captures = SIMULATE_REGEX.as_ref()?.captures(message)?;
    let id = captures.get(1)?.as_str();
    let rest = captures.get(2)?.as_str().trim();
    if rest.is_empty() {
        return None;
    }
    Some((id, rest))
}
