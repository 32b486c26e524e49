use std::sync::Mutex;

use crate::error::{SaveResult, SaverError};
use crate::saver::RequestSaver;

/// Runs at most one save at a time.
///
/// Wrapping a `Send` saver in `Locked` makes it `Sync`, which is how savers
/// holding a reused scratch buffer or a single writer are shared between
/// request handlers. Waiters are not ordered.
#[derive(Debug)]
pub struct Locked<S> {
    inner: Mutex<S>,
}

/// Wrap a saver in the mutual-exclusion decorator.
pub fn lock<S>(saver: S) -> Locked<S> {
    Locked::new(saver)
}

impl<S> Locked<S> {
    pub fn new(saver: S) -> Self {
        Self {
            inner: Mutex::new(saver),
        }
    }

    pub fn into_inner(self) -> SaveResult<S> {
        self.inner.into_inner().map_err(|_| SaverError::Poisoned)
    }
}

impl<Q, S: RequestSaver<Q>> RequestSaver<Q> for Locked<S> {
    type Output = S::Output;

    fn save(&self, request: Q) -> SaveResult<S::Output> {
        let saver = self.inner.lock().map_err(|_| SaverError::Poisoned)?;
        saver.save(request)
    }
}
