use tracing::warn;

use reqsave_archive::{ArchiveError, RequestSerializer, TarEncoder};
use reqsave_types::{BodySource, HeaderSource, Request};

use crate::error::SaveResult;

/// Turns a request into the bytes a sink persists.
pub trait Serializer<Q> {
    fn serialize(&self, request: Q) -> SaveResult<Vec<u8>>;
}

impl<Q, T: Serializer<Q> + ?Sized> Serializer<Q> for &T {
    fn serialize(&self, request: Q) -> SaveResult<Vec<u8>> {
        (**self).serialize(request)
    }
}

impl<H, B> Serializer<Request<H, B>> for RequestSerializer<TarEncoder>
where
    H: HeaderSource,
    B: BodySource,
{
    fn serialize(&self, request: Request<H, B>) -> SaveResult<Vec<u8>> {
        let blob = RequestSerializer::serialize(self, request)?;
        for failure in &blob.failures {
            warn!(path = %failure.path, reason = %failure.reason, "archive entry dropped");
        }
        Ok(blob.bytes)
    }
}

/// Stores the body bytes verbatim and ignores the headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyCopySerializer;

impl<H, B: BodySource> Serializer<Request<H, B>> for BodyCopySerializer {
    fn serialize(&self, request: Request<H, B>) -> SaveResult<Vec<u8>> {
        let (_, body) = request.into_parts();
        Ok(body.into_body_bytes().map_err(ArchiveError::Body)?)
    }
}

/// Produces an empty payload for every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopSerializer;

impl<Q> Serializer<Q> for NopSerializer {
    fn serialize(&self, _request: Q) -> SaveResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// A serializer backed by a closure.
#[derive(Clone, Debug)]
pub struct FnSerializer<F>(F);

/// Wrap a closure as a [`Serializer`].
pub fn serializer_fn<Q, F>(f: F) -> FnSerializer<F>
where
    F: Fn(Q) -> SaveResult<Vec<u8>>,
{
    FnSerializer(f)
}

impl<Q, F> Serializer<Q> for FnSerializer<F>
where
    F: Fn(Q) -> SaveResult<Vec<u8>>,
{
    fn serialize(&self, request: Q) -> SaveResult<Vec<u8>> {
        (self.0)(request)
    }
}
