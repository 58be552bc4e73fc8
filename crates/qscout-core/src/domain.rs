//! Session-level domain types.

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// A room code: the short numeric token that identifies a live session on the
/// host and parameterizes the answers fetch.
///
/// `parse` is the only constructor; the inner string is always digits-only
/// with 4 to 8 digits. Once accepted for a session it is never replaced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    /// Strip every non-digit character and accept the remainder if it has
    /// 4 to 8 digits. Both the scanner and the manual entry path go
    /// through here.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if !(4..=8).contains(&digits.len()) {
            return Err(Error::InvalidIdentifier(format!(
                "expected 4-8 digits, got {} in {raw:?}",
                digits.len()
            )));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-question key assigned by the host document. Stable while a
/// question is displayed, unique within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionKey(pub String);

impl QuestionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Answer kind as reported by the answers API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerKind {
    Single,
    Multiple,
}

/// One raw item of a fetched answer set, before normalization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerItem {
    /// Missing keys happen in real payloads; such items are dropped during
    /// the cache rebuild rather than failing the load.
    pub question_key: Option<String>,
    pub kind: AnswerKind,
    /// Raw text/markup values, in API order.
    pub raw_values: Vec<String>,
}

/// The full collection retrieved in one fetch, in API order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnswerSet {
    pub items: Vec<AnswerItem>,
}

/// A cached, normalized answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerEntry {
    Single(String),
    Multiple(Vec<String>),
}
