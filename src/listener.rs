//! Change Listeners
//!
//! Observers notified after a value was put or the store was cleared.
//!
//! ## Dispatch
//! Listeners run synchronously on the thread that performed the change,
//! after the change reached the files, while that thread still holds the
//! store lock. The lock is reentrant and the store state is not borrowed
//! during dispatch, so a listener may read the source store (`get`,
//! `contains`, `size`) and will see the new value. Listeners added or
//! removed during dispatch take effect from the next event.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::Store;

/// Receives store change events
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent<'_>);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent<'_>) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent<'_>) {
        self(event)
    }
}

/// Wrap a closure as a shareable listener handle
///
/// Keep the returned `Arc` around to remove the listener later.
pub fn from_fn<F>(f: F) -> Arc<dyn ChangeListener>
where
    F: Fn(&ChangeEvent<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A change of the store
///
/// - put: `key` and `new_value` are both set
/// - clear: both are `None`
#[derive(Clone, Copy)]
pub struct ChangeEvent<'a> {
    source: &'a Store,
    key: Option<&'a str>,
    new_value: Option<&'a [u8]>,
}

impl<'a> ChangeEvent<'a> {
    pub(crate) fn put(source: &'a Store, key: &'a str, value: &'a [u8]) -> Self {
        Self {
            source,
            key: Some(key),
            new_value: Some(value),
        }
    }

    pub(crate) fn cleared(source: &'a Store) -> Self {
        Self {
            source,
            key: None,
            new_value: None,
        }
    }

    /// The store that changed
    pub fn source(&self) -> &'a Store {
        self.source
    }

    /// Key that was put, `None` for a clear
    pub fn key(&self) -> Option<&'a str> {
        self.key
    }

    /// Value that was put, `None` for a clear
    pub fn new_value(&self) -> Option<&'a [u8]> {
        self.new_value
    }

    pub fn is_cleared(&self) -> bool {
        self.key.is_none() && self.new_value.is_none()
    }
}

impl std::fmt::Debug for ChangeEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("source", &self.source.root_dir())
            .field("key", &self.key)
            .field("new_value_len", &self.new_value.map(<[u8]>::len))
            .finish()
    }
}

/// List of registered listeners
///
/// Registrations are counted, not deduplicated: adding the same handle twice
/// delivers every event twice, and each registration is removed separately.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn add(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove one registration of `listener` (matched by identity)
    ///
    /// Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn ChangeListener>) -> bool {
        let mut listeners = self.listeners.write();
        let found = listeners
            .iter()
            .position(|l| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));

        match found {
            Some(pos) => {
                listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every registered listener, in registration order
    pub fn notify(&self, event: &ChangeEvent<'_>) {
        // Snapshot so listeners can (un)register without deadlocking
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_change(event);
        }
    }
}
