use std::sync::Arc;

use crate::error::StoreResult;

/// Accepts a finished blob for storage.
///
/// Implementations must satisfy these invariants:
/// - On success the returned count equals `bytes.len()`.
/// - On error no durable record may be assumed to exist.
/// - Errors from the underlying medium are returned as-is; no retries.
pub trait ByteSink {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64>;
}

impl<T: ByteSink + ?Sized> ByteSink for &T {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        (**self).save(bytes)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for Box<T> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        (**self).save(bytes)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for Arc<T> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        (**self).save(bytes)
    }
}
