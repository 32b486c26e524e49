//! Request saving for reqsave.
//!
//! A saver takes one request and persists it. The building blocks compose:
//!
//! ```text
//! AdmissionGuard ─► Locked ─► Pipeline(Serializer ─► ByteSink)
//! ```
//!
//! - [`Pipeline`] serializes a request and hands the bytes to a sink,
//!   short-circuiting on a serialization error
//! - [`compose`] chains any conversion step in front of a saver, with
//!   [`KeyValue`] / [`ListSaver`] for per-request list keys
//! - [`AdmissionGuard`] rejects with [`SaverError::TooManyRequests`] once its
//!   [`Limiter`] reports saturation
//! - [`Locked`] serializes calls into a saver that is not safe to share
//!
//! No component retries. Every error reaches the caller unchanged.

pub mod error;
pub mod guard;
pub mod lock;
pub mod pipeline;
pub mod saver;
pub mod serializer;

pub use error::{SaveResult, SaverError};
pub use guard::{
    guard, limiter_fn, AdmissionGuard, CountingLimiter, FnLimiter, GuardBuilder, Limiter,
    SlidingWindowLimiter, WindowLimit,
};
pub use lock::{lock, Locked};
pub use pipeline::Pipeline;
pub use saver::{compose, saver_fn, Composed, FnSaver, KeyValue, ListSaver, RequestSaver};
pub use serializer::{serializer_fn, BodyCopySerializer, FnSerializer, NopSerializer, Serializer};

#[cfg(test)]
mod tests {
    use super::*;
    use reqsave_archive::{ArchiveReader, RequestSerializer};
    use reqsave_store::StreamSink;
    use reqsave_types::{NoHeaders, Request};

    #[test]
    fn guarded_locked_stream_pipeline() {
        let saver = guard(CountingLimiter::new(), 2).wrap(lock(Pipeline::new(
            RequestSerializer::tar(),
            StreamSink::new(Vec::<u8>::new()),
        )));

        let first = saver.save(Request::new(NoHeaders, "a")).unwrap();
        let second = saver.save(Request::new(NoHeaders, "b")).unwrap();
        assert!(saver.save(Request::new(NoHeaders, "c")).unwrap_err().is_too_many());

        let (_, sink) = saver.into_inner().into_inner().unwrap().into_parts();
        let out = sink.into_inner();
        assert_eq!(out.len() as u64, first + second);

        let (a, b) = out.split_at(first as usize);
        assert_eq!(ArchiveReader::from_bytes(a).unwrap().body(), Some(b"a".as_slice()));
        assert_eq!(ArchiveReader::from_bytes(b).unwrap().body(), Some(b"b".as_slice()));
    }
}
