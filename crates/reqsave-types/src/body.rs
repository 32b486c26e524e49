use std::io::{self, Read};

use bytes::Bytes;

/// A body representation that can be materialized into bytes.
///
/// Materialization consumes the body. Streaming bodies must already be
/// bounded by the caller; nothing here imposes a limit.
pub trait BodySource {
    fn into_body_bytes(self) -> io::Result<Vec<u8>>;
}

impl BodySource for Vec<u8> {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self)
    }
}

impl BodySource for &[u8] {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl BodySource for Bytes {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self.into())
    }
}

impl BodySource for String {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self.into_bytes())
    }
}

impl BodySource for &str {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl BodySource for () {
    fn into_body_bytes(self) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Adapts any reader into a body; reads to EOF.
#[derive(Debug)]
pub struct ReadBody<R>(pub R);

impl<R: Read> BodySource for ReadBody<R> {
    fn into_body_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.0.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
        }
    }

    #[test]
    fn owned_bodies_pass_through() {
        assert_eq!(b"hw".to_vec().into_body_bytes().unwrap(), b"hw");
        assert_eq!(Bytes::from_static(b"xy").into_body_bytes().unwrap(), b"xy");
        assert!(().into_body_bytes().unwrap().is_empty());
    }

    #[test]
    fn read_body_reads_to_end() {
        let body = ReadBody(io::Cursor::new(b"streamed".to_vec()));
        assert_eq!(body.into_body_bytes().unwrap(), b"streamed");
    }

    #[test]
    fn read_body_propagates_errors() {
        let err = ReadBody(FailingReader).into_body_bytes().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
