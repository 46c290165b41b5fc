use stash_core::storage::BackendError;
use stash_storage::cipher::CipherError;
use thiserror::Error;

/// Errors surfaced by [`crate::ReactiveStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Key hashing or value encryption failed.
    #[error("obfuscation failed: {0}")]
    Obfuscation(#[from] CipherError),
    /// A stored blob could not be decrypted: corrupt, foreign, or sealed under
    /// a fingerprint that no longer exists.
    #[error("cannot decrypt value for key {key}: {source}")]
    Decrypt { key: String, source: CipherError },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
