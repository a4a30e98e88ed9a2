//! Snapshot-swapped registry storage
//!
//! Schema, linkage and ACL registries are read on every validation and
//! changed rarely. Each is held as an `Arc` behind a `RwLock`: a validation
//! clones the `Arc` once and works on that snapshot, so it observes either the
//! old or the new registry in full. Writers build a complete replacement and
//! swap it in; the previous value is never mutated.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Holder for an immutable, atomically replaceable registry value
pub struct RegistryHandle<T> {
    current: RwLock<Arc<T>>,
}

impl<T> RegistryHandle<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// The registry as of now; unaffected by later replacements
    pub async fn snapshot(&self) -> Arc<T> {
        self.current.read().await.clone()
    }

    /// Swap in a new registry value
    pub async fn replace(&self, value: T) {
        *self.current.write().await = Arc::new(value);
    }

    /// Derive the next value from the current one and swap it in
    pub async fn modify<F>(&self, derive: F)
    where
        F: FnOnce(&T) -> T,
    {
        let mut guard = self.current.write().await;
        let next = derive(&**guard);
        *guard = Arc::new(next);
    }

    /// Fallible variant of [`RegistryHandle::modify`]
    ///
    /// Concurrent `update` calls are serialized; if `derive` fails nothing is
    /// replaced.
    pub async fn update<F, E>(&self, derive: F) -> Result<(), E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        let mut guard = self.current.write().await;
        let next = derive(&**guard)?;
        *guard = Arc::new(next);
        Ok(())
    }
}

impl<T: Default> Default for RegistryHandle<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
