use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("entry content too large for ustar size field ({size} bytes): {path}")]
    ContentTooLarge { path: String, size: u64 },

    #[error("invalid entry name {path:?}: {reason}")]
    InvalidName { path: String, reason: String },

    #[error("header checksum mismatch at offset {offset}: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        offset: usize,
        stored: u64,
        computed: u64,
    },

    #[error("corrupt entry header at offset {offset}: {reason}")]
    CorruptHeader { offset: usize, reason: String },

    #[error("archive truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("body read failed: {0}")]
    Body(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
