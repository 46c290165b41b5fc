use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use serde::de::DeserializeOwned;
use stash_core::{
    storage::{BackendKind, StorageBackend},
    OptionsPatch, RemovalMode, StoreOptions, Value,
};
use stash_storage::{
    cipher,
    fingerprint::{Fingerprints, TokenGenerator},
};
use tracing::{debug, instrument, warn};

use crate::{
    channel::{Emitter, Observer, Subscription},
    error::{Result, StoreError},
};

/// What a channel carries: `Some` for `set`/`trigger` of a present value,
/// `None` for `remove` (and for `trigger` of a missing key).
pub type Notification = Option<Value>;

/// Text persisted for a `None` notification under [`RemovalMode::Literal`].
pub const ABSENT_MARKER: &str = "null";

struct Channel {
    emitter: Emitter<Notification>,
    observer: Observer<Notification>,
    persistence: Subscription,
}

/// Backends, configuration and fingerprints: everything a persistence
/// subscriber needs, shared between the store and its channels.
struct Shared {
    primary: Arc<dyn StorageBackend>,
    ephemeral: Arc<dyn StorageBackend>,
    options: RwLock<StoreOptions>,
    fingerprints: Fingerprints,
}

impl Shared {
    fn backend(&self, kind: BackendKind) -> &dyn StorageBackend {
        match kind {
            BackendKind::Primary => self.primary.as_ref(),
            BackendKind::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    fn options(&self) -> StoreOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn secret(&self, kind: BackendKind, options: &StoreOptions) -> Result<String> {
        Ok(self
            .fingerprints
            .get_or_create(self.backend(kind), &options.salt)?)
    }

    fn hash(&self, kind: BackendKind, text: &str, options: &StoreOptions) -> Result<String> {
        if !options.obfuscate {
            return Ok(text.to_string());
        }
        Ok(cipher::hash_key(text, &self.secret(kind, options)?)?)
    }

    fn encrypt(&self, kind: BackendKind, text: &str, options: &StoreOptions) -> Result<String> {
        if !options.obfuscate {
            return Ok(text.to_string());
        }
        Ok(cipher::seal(text, &self.secret(kind, options)?)?)
    }

    fn decrypt(
        &self,
        kind: BackendKind,
        key: &str,
        text: String,
        options: &StoreOptions,
    ) -> Result<String> {
        if !options.obfuscate {
            return Ok(text);
        }
        cipher::open(&text, &self.secret(kind, options)?).map_err(|source| {
            warn!(%kind, key, "stored value could not be decrypted");
            StoreError::Decrypt {
                key: key.to_string(),
                source,
            }
        })
    }

    /// The persistence subscriber attached to every channel.
    fn persist(&self, kind: BackendKind, key: &str, notification: &Notification) -> Result<()> {
        let options = self.options();
        let backend = self.backend(kind);
        let physical = self.hash(kind, key, &options)?;

        match notification {
            Some(value) => {
                let text = value.to_text()?;
                backend.set_item(&physical, &self.encrypt(kind, &text, &options)?)?;
            }
            None => match options.removal {
                RemovalMode::Literal => {
                    backend.set_item(&physical, &self.encrypt(kind, ABSENT_MARKER, &options)?)?
                }
                RemovalMode::Physical => backend.remove_item(&physical)?,
            },
        }
        Ok(())
    }
}

/// Reactive key-value store over a primary (durable) and an ephemeral
/// (session) backend.
///
/// Every (backend, key) pair gets one channel the first time it is touched.
/// The channel's first listener writes each emitted value to the backend, so
/// `set` has persisted the value by the time it returns and observers see it
/// afterwards. Channels live as long as the store unless [`Self::dispose`] is
/// called.
///
/// With obfuscation enabled, physical keys are HMACs of the logical key and
/// values are encrypted, both keyed by the backend fingerprint plus salt.
/// The fingerprint sits in the backend under the reserved key `"fingerprint"`.
pub struct ReactiveStore {
    shared: Arc<Shared>,
    channels: Mutex<HashMap<String, Channel>>,
}

/// Builder for [`ReactiveStore`].
pub struct StoreBuilder {
    primary: Arc<dyn StorageBackend>,
    ephemeral: Arc<dyn StorageBackend>,
    options: StoreOptions,
    fingerprints: Fingerprints,
}

impl StoreBuilder {
    pub fn options(mut self, patch: OptionsPatch) -> Self {
        self.options.merge(patch);
        self
    }

    pub fn token_generator(mut self, generator: impl TokenGenerator + 'static) -> Self {
        self.fingerprints = Fingerprints::new(generator);
        self
    }

    /// Build the store and open a channel for every key already present in
    /// either backend.
    pub fn build(self) -> Result<ReactiveStore> {
        let store = ReactiveStore {
            shared: Arc::new(Shared {
                primary: self.primary,
                ephemeral: self.ephemeral,
                options: RwLock::new(self.options),
                fingerprints: self.fingerprints,
            }),
            channels: Mutex::new(HashMap::new()),
        };

        for kind in BackendKind::ALL {
            for key in store.shared.backend(kind).keys()? {
                store.channel(&key, kind);
            }
        }
        Ok(store)
    }
}

impl ReactiveStore {
    pub fn new(
        primary: impl StorageBackend + 'static,
        ephemeral: impl StorageBackend + 'static,
    ) -> Result<Self> {
        Self::builder(primary, ephemeral).build()
    }

    pub fn builder(
        primary: impl StorageBackend + 'static,
        ephemeral: impl StorageBackend + 'static,
    ) -> StoreBuilder {
        StoreBuilder {
            primary: Arc::new(primary),
            ephemeral: Arc::new(ephemeral),
            options: StoreOptions::default(),
            fingerprints: Fingerprints::default(),
        }
    }

    /// Merge `patch` into the live options. Returns `self` for chaining.
    pub fn configure(&self, patch: OptionsPatch) -> &Self {
        self.shared
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(patch);
        self
    }

    pub fn options(&self) -> StoreOptions {
        self.shared.options()
    }

    /// Raw-existence probe: true when the backend holds a non-empty value at
    /// the literal key. Obfuscated entries live at hashed keys and are not
    /// seen here.
    pub fn has(&self, key: &str, backend: Option<BackendKind>) -> Result<bool> {
        let kind = self.resolve(backend);
        let raw = self.shared.backend(kind).get_item(key)?;
        Ok(raw.is_some_and(|value| !value.is_empty()))
    }

    /// Physical keys present in the backend; hashed when obfuscation is on.
    pub fn keys(&self, backend: Option<BackendKind>) -> Result<Vec<String>> {
        let kind = self.resolve(backend);
        Ok(self.shared.backend(kind).keys()?)
    }

    /// Current value, or `None` when nothing is stored. Text that is not valid
    /// JSON comes back as [`Value::Text`].
    #[instrument(skip_all, fields(key))]
    pub fn get(&self, key: &str, backend: Option<BackendKind>) -> Result<Option<Value>> {
        Ok(self.read(key, backend)?.map(Value::parse_or_raw))
    }

    /// [`Self::get`] converted into a caller type. Stored text that is valid
    /// JSON of the wrong shape is decoded as a plain string instead.
    #[instrument(skip_all, fields(key))]
    pub fn get_typed<T: DeserializeOwned>(
        &self,
        key: &str,
        backend: Option<BackendKind>,
    ) -> Result<Option<T>> {
        match self.read(key, backend)? {
            Some(text) => Ok(Some(Value::decode_text(text)?)),
            None => Ok(None),
        }
    }

    /// Emit `value` on the key's channel; it is persisted before this returns.
    #[instrument(skip_all, fields(key))]
    pub fn set(
        &self,
        key: &str,
        value: impl Into<Value>,
        backend: Option<BackendKind>,
    ) -> Result<()> {
        let kind = self.resolve(backend);
        self.channel(key, kind).emit(&Some(value.into()))
    }

    /// Re-emit the stored value of `key` without changing it.
    #[instrument(skip_all, fields(key))]
    pub fn trigger(&self, key: &str, backend: Option<BackendKind>) -> Result<()> {
        let kind = self.resolve(backend);
        let current = self.get(key, Some(kind))?;
        self.channel(key, kind).emit(&current)
    }

    /// [`Self::trigger`] for each key in turn.
    pub fn trigger_many<I, K>(&self, keys: I, backend: Option<BackendKind>) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let kind = self.resolve(backend);
        for key in keys {
            self.trigger(key.as_ref(), Some(kind))?;
        }
        Ok(())
    }

    /// Emit `None` on the key's channel, then delete the entry.
    ///
    /// Under [`RemovalMode::Literal`] the delete targets the literal key, so
    /// with obfuscation enabled the hashed entry stays behind holding the
    /// encrypted absent marker. [`RemovalMode::Physical`] deletes the hashed
    /// entry instead.
    #[instrument(skip_all, fields(key))]
    pub fn remove(&self, key: &str, backend: Option<BackendKind>) -> Result<()> {
        let options = self.shared.options();
        let kind = options.resolve(backend);
        self.channel(key, kind).emit(&None)?;

        if options.removal == RemovalMode::Literal {
            self.shared.backend(kind).remove_item(key)?;
        }
        Ok(())
    }

    /// Remove every key present in the backend, then clear it.
    #[instrument(skip_all, fields(backend))]
    pub fn clear(&self, backend: Option<BackendKind>) -> Result<()> {
        let kind = self.resolve(backend);
        let storage = self.shared.backend(kind);
        for key in storage.keys()? {
            self.remove(&key, Some(kind))?;
        }
        storage.clear()?;
        debug!(%kind, "backend cleared");
        Ok(())
    }

    /// Read-only stream of the key's notifications from now on.
    pub fn get_observer(&self, key: &str, backend: Option<BackendKind>) -> Observer<Notification> {
        let kind = self.resolve(backend);
        let mut channels = self.channels();
        Self::open_channel(&mut channels, &self.shared, key, kind)
            .observer
            .clone()
    }

    /// Drop every channel and its persistence subscriber. Observers handed out
    /// earlier stop receiving values; the next operation on a key opens a new
    /// channel.
    pub fn dispose(&self) {
        let drained: Vec<Channel> = self.channels().drain().map(|(_, channel)| channel).collect();
        for channel in drained {
            channel.persistence.unsubscribe();
        }
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    /// Decrypted text stored for `key`.
    fn read(&self, key: &str, backend: Option<BackendKind>) -> Result<Option<String>> {
        let options = self.shared.options();
        let kind = options.resolve(backend);
        let physical = self.shared.hash(kind, key, &options)?;

        match self.shared.backend(kind).get_item(&physical)? {
            Some(raw) => Ok(Some(self.shared.decrypt(kind, key, raw, &options)?)),
            None => Ok(None),
        }
    }

    fn resolve(&self, backend: Option<BackendKind>) -> BackendKind {
        self.shared.options().resolve(backend)
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emitter for (kind, key), opening the channel on first use. The registry
    /// lock is released before the caller emits.
    fn channel(&self, key: &str, kind: BackendKind) -> Emitter<Notification> {
        let mut channels = self.channels();
        Self::open_channel(&mut channels, &self.shared, key, kind)
            .emitter
            .clone()
    }

    fn open_channel<'a>(
        channels: &'a mut HashMap<String, Channel>,
        shared: &Arc<Shared>,
        key: &str,
        kind: BackendKind,
    ) -> &'a Channel {
        channels.entry(index_key(key, kind)).or_insert_with(|| {
            let emitter = Emitter::new();
            let observer = emitter.observer();
            let shared = Arc::clone(shared);
            let logical = key.to_string();
            let persistence = emitter.attach(move |notification: &Notification| {
                shared.persist(kind, &logical, notification)
            });
            debug!(%kind, key, "opened channel");
            Channel {
                emitter,
                observer,
                persistence,
            }
        })
    }
}

/// Registry key for a channel; always built from the unhashed key.
fn index_key(key: &str, kind: BackendKind) -> String {
    format!("{kind}_{key}")
}
