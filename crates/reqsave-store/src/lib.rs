//! Byte sinks for reqsave.
//!
//! A sink accepts one finished blob and reports how many bytes it
//! persisted. The store never interprets blob contents.
//!
//! # Sinks
//!
//! All sinks implement the [`ByteSink`] trait:
//!
//! - [`StreamSink`]: copies into a caller-owned writer
//! - [`DurableFileSink`]: one new file per blob, written to a temporary
//!   sibling and renamed into place, so readers never see a partial file
//! - [`BufferedFileSink`]: one new file per blob through a buffered
//!   writer, flushed and closed but never synced
//! - [`ListSink`]: pushes the blob onto a named list of a [`ListStore`]
//!
//! # List Stores
//!
//! - [`InMemoryListStore`]: `HashMap`-based store for tests and embedding
//! - [`RedisListStore`]: `LPUSH`/`RPUSH` through an r2d2 pool of `redis`
//!   connections
//!
//! # Design Rules
//!
//! 1. A returned byte count is the length of the blob handed in.
//! 2. Errors are returned verbatim. No sink retries.
//! 3. If both a write and the following close fail, both errors surface.
//! 4. Sinks that hold unsynchronized state are `!Sync`; share them behind a
//!    mutual-exclusion decorator.

pub mod error;
pub mod fs;
pub mod list;
pub mod naming;
pub mod redis_list;
pub mod stream;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{BufferedFileSink, CreateFile, CreateNewFile, DurableFileSink, FileCreator};
pub use list::{InMemoryListStore, ListSink, ListStore};
pub use naming::{NameGenerator, TimestampNames, UuidNames};
pub use redis_list::{ConnectionPool, PoolConfig, PushCommand, RedisListStore};
pub use stream::StreamSink;
pub use traits::ByteSink;
