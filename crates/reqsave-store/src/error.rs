use std::io;

/// Errors from sink and list store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying file, stream, or socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The write (or flush) failed and closing the file failed as well.
    #[error("write failed: {write}; close failed: {close}")]
    WriteAndClose { write: io::Error, close: io::Error },

    /// No connection to the remote store could be checked out in time.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: r2d2::Error,
    },

    /// Transport or parse failure from the Redis client.
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// The remote store answered with an error reply.
    #[error("remote store error: {0}")]
    Remote(String),

    /// The remote store answered with something other than what was expected.
    #[error("unexpected reply: {0}")]
    Protocol(String),

    /// A sink was re-entered while a previous save still held its state.
    #[error("sink is busy")]
    Busy,

    /// A lock guarding sink state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
