use std::sync::Arc;

use tracing::debug;

use reqsave_store::ListStore;

use crate::error::SaveResult;

/// Persists one request and reports the outcome.
///
/// Savers take `&self`. Implementations that hold unsynchronized state
/// (a `RefCell` scratch buffer, a stream writer) are `!Sync` and can only be
/// shared across threads behind [`crate::Locked`].
pub trait RequestSaver<Q> {
    type Output;

    fn save(&self, request: Q) -> SaveResult<Self::Output>;
}

impl<Q, T: RequestSaver<Q> + ?Sized> RequestSaver<Q> for &T {
    type Output = T::Output;

    fn save(&self, request: Q) -> SaveResult<Self::Output> {
        (**self).save(request)
    }
}

impl<Q, T: RequestSaver<Q> + ?Sized> RequestSaver<Q> for Box<T> {
    type Output = T::Output;

    fn save(&self, request: Q) -> SaveResult<Self::Output> {
        (**self).save(request)
    }
}

impl<Q, T: RequestSaver<Q> + ?Sized> RequestSaver<Q> for Arc<T> {
    type Output = T::Output;

    fn save(&self, request: Q) -> SaveResult<Self::Output> {
        (**self).save(request)
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// A saver backed by a closure.
#[derive(Clone, Debug)]
pub struct FnSaver<F>(F);

/// Wrap a closure as a [`RequestSaver`].
pub fn saver_fn<Q, O, F>(f: F) -> FnSaver<F>
where
    F: Fn(Q) -> SaveResult<O>,
{
    FnSaver(f)
}

impl<Q, O, F> RequestSaver<Q> for FnSaver<F>
where
    F: Fn(Q) -> SaveResult<O>,
{
    type Output = O;

    fn save(&self, request: Q) -> SaveResult<O> {
        (self.0)(request)
    }
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

/// A step followed by a saver. See [`compose`].
#[derive(Clone, Debug)]
pub struct Composed<F, S> {
    step: F,
    saver: S,
}

/// Chain a conversion step in front of a saver.
///
/// If the step fails its error is returned and the saver is not invoked.
/// Otherwise the saver's result is returned unchanged.
pub fn compose<F, S>(step: F, saver: S) -> Composed<F, S> {
    Composed { step, saver }
}

impl<F, S> Composed<F, S> {
    pub fn saver(&self) -> &S {
        &self.saver
    }
}

impl<Q, V, F, S> RequestSaver<Q> for Composed<F, S>
where
    F: Fn(Q) -> SaveResult<V>,
    S: RequestSaver<V>,
{
    type Output = S::Output;

    fn save(&self, request: Q) -> SaveResult<S::Output> {
        let value = (self.step)(request)?;
        self.saver.save(value)
    }
}

// ---------------------------------------------------------------------------
// Key/value form
// ---------------------------------------------------------------------------

/// A request projected onto a destination key and a serialized value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Saves [`KeyValue`] pairs by pushing each value onto the list named by its
/// key. Pair it with [`compose`] to route requests to per-request keys.
///
/// Like [`reqsave_store::ListSink`], the returned count is the value length.
#[derive(Clone, Debug)]
pub struct ListSaver<L> {
    store: L,
}

impl<L: ListStore> ListSaver<L> {
    pub fn new(store: L) -> Self {
        Self { store }
    }
}

impl<L: ListStore> RequestSaver<KeyValue> for ListSaver<L> {
    type Output = u64;

    fn save(&self, kv: KeyValue) -> SaveResult<u64> {
        let list_len = self.store.push(&kv.key, &kv.value)?;
        debug!(
            key = %String::from_utf8_lossy(&kv.key),
            bytes = kv.value.len(),
            list_len,
            "pushed keyed blob"
        );
        Ok(kv.value.len() as u64)
    }
}
