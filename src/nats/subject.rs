//! Subject names used by the NATS binding.
//!
//! | Subject                                    | Carries                     |
//! |--------------------------------------------|-----------------------------|
//! | `[prefix.]wrpc.0.0.1.<instance>.<func>`    | invocation request          |
//! | `<R_c>`                                    | acknowledgment (reply R_s)  |
//! | `<R_s>.params[.<index>]`                   | parameter channels          |
//! | `<R_c>.results[.<index>]`                  | result channels             |

use crate::error::{Result, WireError};
use crate::index::Index;

/// Protocol token following the optional prefix.
pub const PROTOCOL: &str = "wrpc.0.0.1";

/// Which half of an invocation a channel subject belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Params,
    Results,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Params => "params",
            Direction::Results => "results",
        }
    }
}

/// Subject a callee listens on for `instance.func`.
pub fn invocation_subject(prefix: Option<&str>, instance: &str, func: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}.{PROTOCOL}.{instance}.{func}"),
        _ => format!("{PROTOCOL}.{instance}.{func}"),
    }
}

/// Subject carrying channel `index` under `reply`.
pub fn channel_subject(reply: &str, direction: Direction, index: &Index) -> String {
    if index.is_root() {
        format!("{reply}.{}", direction.as_str())
    } else {
        format!("{reply}.{}.{}", direction.as_str(), index.subject_suffix())
    }
}

/// Recover the channel index from a subject built by [`channel_subject`].
///
/// # Errors
///
/// `Malformed` if `subject` is not a channel subject of `reply`.
pub fn parse_channel_subject(reply: &str, direction: Direction, subject: &str) -> Result<Index> {
    let malformed = || WireError::Malformed(format!("unexpected subject `{subject}`"));
    let rest = subject
        .strip_prefix(reply)
        .and_then(|s| s.strip_prefix('.'))
        .and_then(|s| s.strip_prefix(direction.as_str()))
        .ok_or_else(malformed)?;
    if rest.is_empty() {
        return Ok(Index::root());
    }
    let suffix = rest.strip_prefix('.').ok_or_else(malformed)?;
    if suffix.is_empty() {
        return Err(malformed());
    }
    Index::parse_subject_suffix(suffix)
}

/// Subscription patterns covering every channel of one direction.
pub fn channel_wildcards(reply: &str, direction: Direction) -> [String; 2] {
    let base = format!("{reply}.{}", direction.as_str());
    let nested = format!("{base}.>");
    [base, nested]
}
