use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ByteSink;

/// A store of named lists that accepts pushes of opaque values.
pub trait ListStore {
    /// Push `value` onto the list at `key` and return the list length the
    /// store acknowledged.
    fn push(&self, key: &[u8], value: &[u8]) -> StoreResult<u64>;
}

impl<T: ListStore + ?Sized> ListStore for &T {
    fn push(&self, key: &[u8], value: &[u8]) -> StoreResult<u64> {
        (**self).push(key, value)
    }
}

impl<T: ListStore + ?Sized> ListStore for Arc<T> {
    fn push(&self, key: &[u8], value: &[u8]) -> StoreResult<u64> {
        (**self).push(key, value)
    }
}

/// Pushes each blob as one value onto a fixed list.
///
/// The returned byte count is the length of the blob handed in, not a figure
/// reported by the store. The store's acknowledgement (the new list length)
/// is only logged; a push that fails to be acknowledged is an error.
#[derive(Debug)]
pub struct ListSink<S> {
    store: S,
    key: Vec<u8>,
}

impl<S: ListStore> ListSink<S> {
    pub fn new(store: S, key: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ListStore> ByteSink for ListSink<S> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        let list_len = self.store.push(&self.key, bytes)?;
        debug!(
            key = %String::from_utf8_lossy(&self.key),
            bytes = bytes.len(),
            list_len,
            "blob pushed"
        );
        Ok(bytes.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// InMemoryListStore
// ---------------------------------------------------------------------------

/// In-memory list store with `LPUSH` semantics (new values at the head).
///
/// Intended for tests and embedding. Lists live behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryListStore {
    lists: RwLock<HashMap<Vec<u8>, VecDeque<Vec<u8>>>>,
}

impl InMemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the list at `key` (0 if absent).
    pub fn len(&self, key: &[u8]) -> StoreResult<usize> {
        let lists = self.lists.read().map_err(|_| StoreError::Poisoned("list store"))?;
        Ok(lists.get(key).map_or(0, VecDeque::len))
    }

    /// Values at `key`, head first.
    pub fn values(&self, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        let lists = self.lists.read().map_err(|_| StoreError::Poisoned("list store"))?;
        Ok(lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Remove and return the oldest value at `key`.
    pub fn pop_oldest(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned("list store"))?;
        Ok(lists.get_mut(key).and_then(VecDeque::pop_back))
    }
}

impl ListStore for InMemoryListStore {
    fn push(&self, key: &[u8], value: &[u8]) -> StoreResult<u64> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned("list store"))?;
        let list = lists.entry(key.to_vec()).or_default();
        list.push_front(value.to_vec());
        Ok(list.len() as u64)
    }
}
