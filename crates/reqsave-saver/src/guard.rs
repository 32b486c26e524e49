//! Admission control in front of a saver.
//!
//! A [`Limiter`] answers "is this one too many?" for a caller-supplied limit
//! and records the admission in the same step. The [`AdmissionGuard`]
//! consults it before every save and returns
//! [`SaverError::TooManyRequests`] without touching the wrapped saver when
//! the answer is yes.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SaveResult, SaverError};
use crate::saver::RequestSaver;

/// Saturation check with admission bookkeeping.
///
/// `too_many` must check and record atomically: when it returns `false` the
/// call counts as admitted, and concurrent callers can never be admitted
/// past the limit.
pub trait Limiter {
    type Limit;

    fn too_many(&self, limit: &Self::Limit) -> bool;
}

impl<T: Limiter + ?Sized> Limiter for &T {
    type Limit = T::Limit;

    fn too_many(&self, limit: &Self::Limit) -> bool {
        (**self).too_many(limit)
    }
}

impl<T: Limiter + ?Sized> Limiter for Arc<T> {
    type Limit = T::Limit;

    fn too_many(&self, limit: &Self::Limit) -> bool {
        (**self).too_many(limit)
    }
}

// ---------------------------------------------------------------------------
// CountingLimiter
// ---------------------------------------------------------------------------

/// Admits the first `limit` calls and rejects every call after that.
///
/// It counts admissions, not successful saves: a save that fails after being
/// admitted still uses up its slot, and rejected calls use none.
#[derive(Debug, Default)]
pub struct CountingLimiter {
    admitted: AtomicU64,
}

impl CountingLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Acquire)
    }
}

impl Limiter for CountingLimiter {
    type Limit = u64;

    fn too_many(&self, limit: &u64) -> bool {
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < *limit).then_some(n + 1))
            .is_err()
    }
}

// ---------------------------------------------------------------------------
// SlidingWindowLimiter
// ---------------------------------------------------------------------------

/// Limit for [`SlidingWindowLimiter`]: at most `max` admissions in any
/// `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max: usize,
    pub window: Duration,
}

impl WindowLimit {
    pub fn new(max: usize, window: Duration) -> Self {
        Self { max, window }
    }
}

/// Ring of recent admission instants.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter {
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn too_many_at(&self, limit: &WindowLimit, now: Instant) -> bool {
        let mut ring = self
            .admitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while let Some(&oldest) = ring.front() {
            if now.saturating_duration_since(oldest) < limit.window {
                break;
            }
            ring.pop_front();
        }
        if ring.len() >= limit.max {
            return true;
        }
        ring.push_back(now);
        false
    }
}

impl Limiter for SlidingWindowLimiter {
    type Limit = WindowLimit;

    fn too_many(&self, limit: &WindowLimit) -> bool {
        self.too_many_at(limit, Instant::now())
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// A limiter backed by a closure over the limit.
pub struct FnLimiter<F, L> {
    f: F,
    _limit: PhantomData<fn(&L)>,
}

/// Wrap a closure as a [`Limiter`]. The closure owns the limiter state.
pub fn limiter_fn<L, F>(f: F) -> FnLimiter<F, L>
where
    F: Fn(&L) -> bool,
{
    FnLimiter {
        f,
        _limit: PhantomData,
    }
}

impl<F, L> Limiter for FnLimiter<F, L>
where
    F: Fn(&L) -> bool,
{
    type Limit = L;

    fn too_many(&self, limit: &L) -> bool {
        (self.f)(limit)
    }
}

// ---------------------------------------------------------------------------
// AdmissionGuard
// ---------------------------------------------------------------------------

/// A limiter and its limit, ready to wrap savers. See [`guard`].
pub struct GuardBuilder<L: Limiter> {
    limiter: L,
    limit: L::Limit,
}

/// Build an admission guard from a limiter and the limit it enforces.
pub fn guard<L: Limiter>(limiter: L, limit: L::Limit) -> GuardBuilder<L> {
    GuardBuilder { limiter, limit }
}

impl<L: Limiter> GuardBuilder<L> {
    pub fn wrap<S>(self, saver: S) -> AdmissionGuard<L, S> {
        AdmissionGuard {
            limiter: self.limiter,
            limit: self.limit,
            inner: saver,
        }
    }
}

/// Rejects saves once the limiter reports saturation.
pub struct AdmissionGuard<L: Limiter, S> {
    limiter: L,
    limit: L::Limit,
    inner: S,
}

impl<L: Limiter, S> AdmissionGuard<L, S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<Q, L, S> RequestSaver<Q> for AdmissionGuard<L, S>
where
    L: Limiter,
    S: RequestSaver<Q>,
{
    type Output = S::Output;

    fn save(&self, request: Q) -> SaveResult<S::Output> {
        if self.limiter.too_many(&self.limit) {
            warn!("request rejected by admission guard");
            return Err(SaverError::TooManyRequests);
        }
        self.inner.save(request)
    }
}
