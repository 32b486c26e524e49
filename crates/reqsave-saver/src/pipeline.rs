use tracing::debug;

use reqsave_store::ByteSink;

use crate::error::SaveResult;
use crate::saver::RequestSaver;
use crate::serializer::Serializer;

/// Serializer followed by a sink.
///
/// A serialization error is returned as-is and the sink is never invoked.
/// Otherwise the sink's byte count or error is returned as-is. Nothing is
/// retried.
#[derive(Clone, Debug)]
pub struct Pipeline<S, K> {
    serializer: S,
    sink: K,
}

impl<S, K> Pipeline<S, K> {
    pub fn new(serializer: S, sink: K) -> Self {
        Self { serializer, sink }
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.serializer, self.sink)
    }
}

impl<Q, S, K> RequestSaver<Q> for Pipeline<S, K>
where
    S: Serializer<Q>,
    K: ByteSink,
{
    type Output = u64;

    fn save(&self, request: Q) -> SaveResult<u64> {
        let blob = self.serializer.serialize(request)?;
        let written = self.sink.save(&blob)?;
        debug!(bytes = written, "request saved");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SaverError;
    use crate::serializer::serializer_fn;
    use reqsave_archive::{ArchiveError, ArchiveReader, RequestSerializer};
    use reqsave_store::{DurableFileSink, StoreError, StoreResult, StreamSink};
    use reqsave_types::{NoHeaders, Request};
    use std::cell::Cell;
    use std::io;
    use std::path::PathBuf;

    #[derive(Default)]
    struct CountingSink {
        calls: Cell<usize>,
        fail: bool,
    }

    impl ByteSink for CountingSink {
        fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "read-only")));
            }
            Ok(bytes.len() as u64)
        }
    }

    #[test]
    fn serializer_output_reaches_sink() {
        let pipeline = Pipeline::new(RequestSerializer::tar(), StreamSink::new(Vec::<u8>::new()));
        let written = pipeline
            .save(Request::new(vec![("Content-Type", "text/plain")], "hello"))
            .unwrap();

        let (_, sink) = pipeline.into_parts();
        let out = sink.into_inner();
        assert_eq!(written, out.len() as u64);
        let reader = ArchiveReader::from_bytes(&out).unwrap();
        assert_eq!(reader.body(), Some(b"hello".as_slice()));
    }

    #[test]
    fn serialization_error_skips_sink() {
        let sink = CountingSink::default();
        let failing = serializer_fn(|_: ()| Err(ArchiveError::Body(io::Error::other("eof")).into()));
        let pipeline = Pipeline::new(failing, &sink);

        let err = pipeline.save(()).unwrap_err();
        assert!(matches!(err, SaverError::Serialization(ArchiveError::Body(_))));
        assert_eq!(sink.calls.get(), 0);
    }

    #[test]
    fn sink_error_is_returned_verbatim() {
        let sink = CountingSink {
            fail: true,
            ..Default::default()
        };
        let pipeline = Pipeline::new(RequestSerializer::tar(), &sink);
        let err = pipeline.save(Request::new(NoHeaders, ())).unwrap_err();
        assert!(matches!(err, SaverError::Store(StoreError::Io(ref e)) if e.kind() == io::ErrorKind::PermissionDenied));
        assert_eq!(sink.calls.get(), 1);
    }

    #[test]
    fn saves_to_durable_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("req.tar");
        let path = target.clone();
        let sink = DurableFileSink::new(move || -> PathBuf { path.clone() });
        let pipeline = Pipeline::new(RequestSerializer::tar(), sink);

        let written = pipeline.save(Request::new(NoHeaders, "on disk")).unwrap();
        let on_disk = std::fs::read(&target).unwrap();
        assert_eq!(written, on_disk.len() as u64);
        assert_eq!(ArchiveReader::from_bytes(&on_disk).unwrap().body(), Some(b"on disk".as_slice()));
    }
}
