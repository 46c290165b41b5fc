//! Synchronous push channels: an [`Emitter`] fans every value out to its
//! listeners on the caller's thread, in subscription order, before `emit`
//! returns. [`Observer`] is the read-only side handed to callers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::StoreError;

type Listener<T> = Arc<dyn Fn(&T) -> Result<(), StoreError> + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

type Registry<T> = Mutex<Listeners<T>>;

fn lock<T>(registry: &Registry<T>) -> MutexGuard<'_, Listeners<T>> {
    // Listeners never run under the lock, so a poisoned guard still holds a
    // consistent list.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn attach<T: 'static>(registry: &Arc<Registry<T>>, listener: Listener<T>) -> Subscription {
    let id = {
        let mut listeners = lock(registry);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    };
    let weak: Weak<dyn Detach> = Arc::downgrade(registry) as Weak<dyn Detach>;
    Subscription {
        id,
        registry: weak,
    }
}

/// Write side of a channel.
pub struct Emitter<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Read-only view sharing this emitter's listeners.
    pub fn observer(&self) -> Observer<T> {
        Observer {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Deliver `value` to every listener. Stops at the first failing listener
    /// and returns its error; later listeners do not see the value.
    pub fn emit(&self, value: &T) -> Result<(), StoreError> {
        let snapshot: Vec<Listener<T>> = lock(&self.registry)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(value)?;
        }
        Ok(())
    }

    /// Attach a listener whose failure aborts the emission.
    pub(crate) fn attach<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        attach(&self.registry, Arc::new(listener))
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

/// Read side of a channel. The stream never completes on its own.
pub struct Observer<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Observer<T> {
    /// Run `callback` for every value emitted from now on.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        attach(
            &self.registry,
            Arc::new(move |value: &T| {
                callback(value);
                Ok(())
            }),
        )
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T> Detach for Registry<T>
where
    Listeners<T>: Send,
{
    fn detach(&self, id: u64) {
        lock(self).entries.retain(|(entry, _)| *entry != id);
    }
}

/// Handle to one listener. Dropping it keeps the listener attached; call
/// [`Subscription::unsubscribe`] to stop receiving values.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
