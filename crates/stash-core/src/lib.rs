//! Core abstractions for Stash: the storage backend contract, the value model and
//! store options. This crate is intentionally small to keep dependency surface minimal.

pub mod options;
pub mod storage;
pub mod value;

pub use options::{OptionsPatch, RemovalMode, StoreOptions, DEFAULT_SALT};
pub use storage::{BackendError, BackendKind, MemoryBackend, StorageBackend};
pub use value::Value;
