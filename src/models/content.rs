use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The three kinds of playable unit in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Episode,
    Movie,
    Special,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Episode => "episode",
            ContentKind::Movie => "movie",
            ContentKind::Special => "special",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one playable unit. A new `ContentRef` always means a new
/// playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ContentRef {
    /// Episode by its absolute number within the series
    Episode(u32),
    Movie(u32),
    Special(u32),
}

impl ContentRef {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentRef::Episode(_) => ContentKind::Episode,
            ContentRef::Movie(_) => ContentKind::Movie,
            ContentRef::Special(_) => ContentKind::Special,
        }
    }

    /// Episode number, movie id or special id depending on the kind
    pub fn number(&self) -> u32 {
        match self {
            ContentRef::Episode(n) | ContentRef::Movie(n) | ContentRef::Special(n) => *n,
        }
    }

    pub fn is_episode(&self) -> bool {
        matches!(self, ContentRef::Episode(_))
    }

    /// Build a reference of the same kind with a different number
    pub fn with_number(&self, number: u32) -> Self {
        match self {
            ContentRef::Episode(_) => ContentRef::Episode(number),
            ContentRef::Movie(_) => ContentRef::Movie(number),
            ContentRef::Special(_) => ContentRef::Special(number),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid content reference '{0}' (expected N, episode:N, movie:N or special:N)")]
pub struct ParseContentRefError(String);

impl FromStr for ContentRef {
    type Err = ParseContentRefError;

    /// Accepts a bare episode number (`45`) or `kind:number`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseContentRefError(s.to_string());
        let trimmed = s.trim();

        let (kind, number) = match trimmed.split_once(':') {
            Some((kind, number)) => (kind.trim().to_ascii_lowercase(), number.trim()),
            None => ("episode".to_string(), trimmed),
        };
        let number: u32 = number.parse().map_err(|_| invalid())?;

        match kind.as_str() {
            "episode" | "ep" => Ok(ContentRef::Episode(number)),
            "movie" => Ok(ContentRef::Movie(number)),
            "special" => Ok(ContentRef::Special(number)),
            _ => Err(invalid()),
        }
    }
}
