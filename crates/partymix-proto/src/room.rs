//! Room identifiers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Short human-shareable room identifier (e.g. `"4821"`).
///
/// Always serialized as a JSON string. Inbound frames from some server
/// versions carry the code as a bare number; both forms decode to the same
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Wrap a room code. Surrounding whitespace is trimmed.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_owned())
    }

    /// Borrow the code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the code has no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self::new(text),
            Raw::Number(number) => Self::new(number.to_string()),
        })
    }
}
