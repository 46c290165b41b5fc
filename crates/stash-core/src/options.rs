use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::BackendKind;

/// Salt mixed into every fingerprint unless configured otherwise.
pub const DEFAULT_SALT: &str = "96bc32db-8f3d-4f56-b9f8-7c976d068f5c";

/// What `remove` deletes from the physical backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMode {
    /// Write the absent marker through the channel, then delete the literal
    /// (unhashed) key. With obfuscation on, the hashed entry is left behind.
    #[default]
    Literal,
    /// Delete the hashed key the value actually lives at.
    Physical,
}

/// Live configuration of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Backend used when an operation does not name one.
    pub default: BackendKind,
    /// Appended to each backend fingerprint before hashing/encryption.
    pub salt: String,
    /// Hash keys and encrypt values before they reach a backend.
    pub obfuscate: bool,
    pub removal: RemovalMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default: BackendKind::Primary,
            salt: DEFAULT_SALT.to_string(),
            obfuscate: false,
            removal: RemovalMode::Literal,
        }
    }
}

impl StoreOptions {
    /// Merge the fields present in `patch`; absent fields keep their value.
    pub fn merge(&mut self, patch: OptionsPatch) {
        if let Some(default) = patch.default {
            self.default = default;
        }
        if let Some(salt) = patch.salt {
            self.salt = salt;
        }
        if let Some(obfuscate) = patch.obfuscate {
            self.obfuscate = obfuscate;
        }
        if let Some(removal) = patch.removal {
            self.removal = removal;
        }
    }

    /// Backend an operation runs against.
    pub fn resolve(&self, backend: Option<BackendKind>) -> BackendKind {
        backend.unwrap_or(self.default)
    }
}

/// Partial options, as accepted by `configure` and config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsPatch {
    /// Unknown backend names, and values that are not names at all,
    /// deserialize to `None` and keep the prior default.
    #[serde(
        default,
        deserialize_with = "lenient_backend",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<BackendKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal: Option<RemovalMode>,
}

impl OptionsPatch {
    pub fn default_backend(mut self, backend: BackendKind) -> Self {
        self.default = Some(backend);
        self
    }

    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn obfuscate(mut self, obfuscate: bool) -> Self {
        self.obfuscate = Some(obfuscate);
        self
    }

    pub fn removal(mut self, removal: RemovalMode) -> Self {
        self.removal = Some(removal);
        self
    }
}

fn lenient_backend<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BackendKind>, D::Error> {
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(BackendKind::from_name))
}
