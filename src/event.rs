// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Events: the unit of change in the transaction log.
//!
//! Every mutation of the store is expressed as an [`Event`]. The log is
//! line-oriented text, one record per line:
//!
//! ```text
//! <sequence:u64>\t<kind:u8>\t<key>\t<value>\n
//! ```
//!
//! `kind` is `1` for Delete (value empty) and `2` for Put.
//!
//! # Invariants
//! - Sequence numbers are assigned by the log writer, never by callers
//! - Keys are non-empty
//! - Neither key nor value may contain `\t`, `\n` or `\r`

use crate::error::{EventError, EventResult};
use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Delete = 1,
    Put = 2,
}

impl EventKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EventKind::Delete),
            2 => Some(EventKind::Put),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Delete => f.write_str("delete"),
            EventKind::Put => f.write_str("put"),
        }
    }
}

/// A single durable change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Strictly increasing within one log. Zero until the writer assigns it.
    pub sequence: u64,
    pub kind: EventKind,
    pub key: String,
    /// Only meaningful for [`EventKind::Put`].
    pub value: String,
}

impl Event {
    /// A Put that has not been sequenced yet.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A Delete that has not been sequenced yet.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Encode into one log line, trailing newline included.
    pub fn encode(&self) -> EventResult<String> {
        validate_key(&self.key)?;
        let value = match self.kind {
            EventKind::Put => {
                validate_value(&self.value)?;
                self.value.as_str()
            }
            EventKind::Delete => "",
        };

        Ok(format!(
            "{}\t{}\t{}\t{}\n",
            self.sequence,
            self.kind.code(),
            self.key,
            value
        ))
    }

    /// Decode one log line. The line must still carry its `\n`.
    pub fn decode(line: &str) -> EventResult<Self> {
        let body = line.strip_suffix('\n').ok_or(EventError::Unterminated)?;

        let fields: Vec<&str> = body.split('\t').collect();
        if fields.len() != 4 {
            return Err(EventError::FieldCount(fields.len()));
        }

        let sequence = fields[0]
            .parse::<u64>()
            .map_err(|_| EventError::InvalidSequence(fields[0].to_string()))?;

        let kind = fields[1]
            .parse::<u8>()
            .ok()
            .and_then(EventKind::from_code)
            .ok_or_else(|| EventError::InvalidKind(fields[1].to_string()))?;

        let key = fields[2];
        validate_key(key)?;

        let value = match kind {
            EventKind::Put => {
                validate_value(fields[3])?;
                fields[3].to_string()
            }
            // Delete carries no value; anything written there is ignored.
            EventKind::Delete => String::new(),
        };

        Ok(Self {
            sequence,
            kind,
            key: key.to_string(),
            value,
        })
    }
}

fn has_reserved(s: &str) -> bool {
    s.contains(&['\t', '\n', '\r'][..])
}

/// Reject keys that cannot be written to the log.
pub fn validate_key(key: &str) -> EventResult<()> {
    if key.is_empty() {
        return Err(EventError::EmptyKey);
    }
    if has_reserved(key) {
        return Err(EventError::ReservedCharacter { field: "key" });
    }
    Ok(())
}

/// Reject values that cannot be written to the log.
pub fn validate_value(value: &str) -> EventResult<()> {
    if has_reserved(value) {
        return Err(EventError::ReservedCharacter { field: "value" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_put() {
        let line = Event::put("color", "blue").with_sequence(7).encode().unwrap();
        assert_eq!(line, "7\t2\tcolor\tblue\n");
    }

    #[test]
    fn test_encode_delete_drops_value() {
        let mut event = Event::delete("color").with_sequence(3);
        event.value = "leftover".into();
        assert_eq!(event.encode().unwrap(), "3\t1\tcolor\t\n");
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let err = Event::decode("1\t9\tk\tv\n").unwrap_err();
        assert_eq!(err, EventError::InvalidKind("9".into()));
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = Event::put("a", "1").with_sequence(1);
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }
}
