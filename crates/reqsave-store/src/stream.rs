use std::cell::RefCell;
use std::io::{self, Write};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ByteSink;

/// Copies each blob into a caller-owned writer.
///
/// Nothing is buffered or flushed here. The writer is held in a `RefCell`,
/// so the sink is `Send` (when `W` is) but not `Sync`: concurrent callers
/// must go through a mutual-exclusion decorator, which also keeps blobs
/// from interleaving on the shared writer.
pub struct StreamSink<W> {
    writer: RefCell<W>,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    /// Run `f` against the writer.
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut W) -> T) -> StoreResult<T> {
        let mut w = self.writer.try_borrow_mut().map_err(|_| StoreError::Busy)?;
        Ok(f(&mut *w))
    }
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        let mut w = self.writer.try_borrow_mut().map_err(|_| StoreError::Busy)?;
        let written = io::copy(&mut &bytes[..], &mut *w)?;
        debug!(bytes = written, "blob copied to stream");
        Ok(written)
    }
}

impl<W> std::fmt::Debug for StreamSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink").finish_non_exhaustive()
    }
}
