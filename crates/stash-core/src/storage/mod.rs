use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

mod memory;

pub use memory::MemoryBackend;

/// Errors produced by storage backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl BackendError {
    pub fn storage<E: ToString>(err: E) -> Self {
        BackendError::Storage {
            reason: err.to_string(),
        }
    }
}

/// Minimal string key-value contract shared by every storage medium
/// (a durable file, a session map, a test double).
pub trait StorageBackend: Send + Sync {
    /// Raw value for a key, `None` when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Persist a value under a key, overwriting any existing entry.
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove a key and its value (idempotent).
    fn remove_item(&self, key: &str) -> Result<(), BackendError>;

    /// Drop every entry.
    fn clear(&self) -> Result<(), BackendError>;

    /// Keys currently present.
    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        (**self).remove_item(key)
    }

    fn clear(&self) -> Result<(), BackendError> {
        (**self).clear()
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        (**self).keys()
    }
}

/// Which of the two backends an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Durable across sessions.
    #[default]
    Primary,
    /// Lives only for the current session.
    Ephemeral,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Primary, BackendKind::Ephemeral];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Primary => "primary",
            BackendKind::Ephemeral => "ephemeral",
        }
    }

    /// Lenient lookup by name; `local`/`session` are accepted as aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary" | "local" => Some(BackendKind::Primary),
            "ephemeral" | "session" => Some(BackendKind::Ephemeral),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::from_name(s).ok_or_else(|| BackendError::Storage {
            reason: format!("unknown backend: {s}"),
        })
    }
}

impl Serialize for BackendKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("primary".parse::<BackendKind>(), Ok(BackendKind::Primary));
        assert_eq!("Session".parse::<BackendKind>(), Ok(BackendKind::Ephemeral));
        assert_eq!(BackendKind::from_name("local"), Some(BackendKind::Primary));
        assert!("cloud".parse::<BackendKind>().is_err());
    }

    #[test]
    fn displays_canonical_name() {
        assert_eq!(BackendKind::Ephemeral.to_string(), "ephemeral");
        assert_eq!(BackendKind::default(), BackendKind::Primary);
    }
}
