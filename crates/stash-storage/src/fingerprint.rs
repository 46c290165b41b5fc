use std::sync::Arc;

use stash_core::storage::{BackendError, StorageBackend};
use tracing::debug;
use uuid::Uuid;

/// Reserved backend key holding the fingerprint token. Never obfuscated, so a
/// caller key with the same name collides with it.
pub const FINGERPRINT_KEY: &str = "fingerprint";

/// Source of random, effectively unique tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// UUIDv4 tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokens;

impl TokenGenerator for UuidTokens {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Always hands out the same token; for tests and reproducible fixtures.
#[derive(Debug, Clone)]
pub struct FixedToken(pub String);

impl TokenGenerator for FixedToken {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// Creates and reads the per-backend fingerprint.
#[derive(Clone)]
pub struct Fingerprints {
    generator: Arc<dyn TokenGenerator>,
}

impl Default for Fingerprints {
    fn default() -> Self {
        Self::new(UuidTokens)
    }
}

impl Fingerprints {
    pub fn new(generator: impl TokenGenerator + 'static) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }

    /// Stored token for `backend` followed by `salt`. A token is generated and
    /// written on first use and reused until the entry disappears.
    pub fn get_or_create(
        &self,
        backend: &dyn StorageBackend,
        salt: &str,
    ) -> Result<String, BackendError> {
        let token = match backend.get_item(FINGERPRINT_KEY)? {
            Some(token) if !token.is_empty() => token,
            _ => {
                let token = self.generator.generate();
                backend.set_item(FINGERPRINT_KEY, &token)?;
                debug!("generated backend fingerprint");
                token
            }
        };
        Ok(format!("{token}{salt}"))
    }
}
