use reqsave_types::{BodySource, HeaderSource, Request};

use crate::encoder::ArchiveEncoder;
use crate::error::{ArchiveError, ArchiveResult};
use crate::policy::WriteErrorPolicy;
use crate::tar::TarEncoder;

pub const HEADER_NAMESPACE: &str = "header";
pub const BODY_NAMESPACE: &str = "body";
pub const BODY_NAME: &str = "body";

/// Projects a [`Request`] onto an [`ArchiveEncoder`].
///
/// Header pairs are written first, in the order the header source yields
/// them, each as `header/<key>`. The body is materialized once and written
/// last as `body/body`. Header keys that are not UTF-8 are converted
/// lossily.
#[derive(Clone, Debug, Default)]
pub struct RequestSerializer<E = TarEncoder> {
    encoder: E,
}

impl RequestSerializer<TarEncoder> {
    /// Tar serializer with the default (abort) write policy.
    pub fn tar() -> Self {
        Self::new(TarEncoder::default())
    }

    pub fn tar_with_policy(policy: WriteErrorPolicy) -> Self {
        Self::new(TarEncoder::new(policy))
    }
}

impl<E: ArchiveEncoder> RequestSerializer<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn serialize<H, B>(&self, request: Request<H, B>) -> ArchiveResult<E::Output>
    where
        H: HeaderSource,
        B: BodySource,
    {
        let (header, body) = request.into_parts();
        let mut partial = self.encoder.initialize();

        let mut failed: Option<ArchiveError> = None;
        header.for_each_pair(&mut |key, value| {
            if failed.is_some() {
                return;
            }
            let key = String::from_utf8_lossy(key);
            if let Err(e) = self.encoder.write(&mut partial, HEADER_NAMESPACE, &key, value) {
                failed = Some(e);
            }
        });
        if let Some(e) = failed {
            return Err(e);
        }

        let body = body.into_body_bytes().map_err(ArchiveError::Body)?;
        self.encoder
            .write(&mut partial, BODY_NAMESPACE, BODY_NAME, &body)?;
        self.encoder.finalize(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ArchiveReader;
    use reqsave_types::{HeaderMultiMap, NoHeaders, ReadBody};
    use std::io;

    struct BrokenBody;

    impl io::Read for BrokenBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "body cut short"))
        }
    }

    #[test]
    fn headers_precede_body_in_iteration_order() {
        let body = r#"{
            "count200": 634,
            "count404": 42
        }"#;
        let q = Request::new(
            vec![("Content-Type", "application/json"), ("Content-Encoding", "gzip")],
            body,
        );
        let blob = RequestSerializer::tar().serialize(q).unwrap();
        let reader = ArchiveReader::from_bytes(&blob.bytes).unwrap();

        let paths: Vec<&str> = reader.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            ["header/Content-Type", "header/Content-Encoding", "body/body"]
        );
        assert_eq!(reader.first_header("Content-Encoding"), Some(b"gzip".as_slice()));
        assert_eq!(reader.body(), Some(body.as_bytes()));
    }

    #[test]
    fn multi_valued_header_writes_one_entry_per_value() {
        let mut headers = HeaderMultiMap::new();
        headers.add("X-Forwarded-For", "10.0.0.1");
        headers.add("X-Forwarded-For", "10.0.0.2");
        let blob = RequestSerializer::tar()
            .serialize(Request::new(headers, ()))
            .unwrap();
        let reader = ArchiveReader::from_bytes(&blob.bytes).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.header_values("X-Forwarded-For").len(), 2);
    }

    #[test]
    fn streamed_body_is_materialized() {
        let body = ReadBody(io::Cursor::new(b"from a reader".to_vec()));
        let blob = RequestSerializer::tar()
            .serialize(Request::new(NoHeaders, body))
            .unwrap();
        let reader = ArchiveReader::from_bytes(&blob.bytes).unwrap();
        assert_eq!(reader.body(), Some(b"from a reader".as_slice()));
    }

    #[test]
    fn body_read_failure_is_a_body_error() {
        let err = RequestSerializer::tar()
            .serialize(Request::new(NoHeaders, ReadBody(BrokenBody)))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Body(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn bad_header_aborts_by_default() {
        let err = RequestSerializer::tar()
            .serialize(Request::new(vec![("bad\0key", "v")], ()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidName { .. }));
    }

    #[test]
    fn long_header_name_is_kept() {
        let long = "k".repeat(200);
        let blob = RequestSerializer::tar()
            .serialize(Request::new(vec![(long.as_str(), "v")], ()))
            .unwrap();
        let reader = ArchiveReader::from_bytes(&blob.bytes).unwrap();
        assert_eq!(reader.first_header(&long), Some(b"v".as_slice()));
    }

    #[test]
    fn bad_header_is_collected_under_collect_policy() {
        let blob = RequestSerializer::tar_with_policy(WriteErrorPolicy::Collect)
            .serialize(Request::new(vec![("bad\0key", "v"), ("Host", "example")], ()))
            .unwrap();
        assert_eq!(blob.failures.len(), 1);
        let reader = ArchiveReader::from_bytes(&blob.bytes).unwrap();
        let paths: Vec<&str> = reader.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["header/Host", "body/body"]);
    }
}
