//! Reactive key-value store: per-key push channels over two storage backends,
//! with optional key hashing and value encryption.

pub mod channel;
pub mod error;
pub mod store;

pub use channel::{Emitter, Observer, Subscription};
pub use error::{Result, StoreError};
pub use store::{Notification, ReactiveStore, StoreBuilder, ABSENT_MARKER};

pub use stash_core::{BackendKind, OptionsPatch, RemovalMode, StoreOptions, Value};
