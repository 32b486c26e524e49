//! Archive encoding for reqsave.
//!
//! A captured request is stored as a tar-compatible (ustar) blob: one
//! regular-file entry per header value, named `header/<key>`, followed by a
//! single `body/body` entry holding the captured body. Entries carry mode
//! `0400`, a zero mtime, and no owner, so the same request always encodes to
//! the same bytes.
//!
//! # Components
//!
//! - [`ArchiveEncoder`]: initialize / write / finalize contract
//! - [`TarEncoder`]: ustar implementation producing an [`ArchiveBlob`]
//! - [`EntryCollector`]: in-memory encoder that keeps entries unframed
//! - [`ArchiveReader`]: decodes a blob back into [`ArchiveEntry`] values
//! - [`RequestSerializer`]: projects a `Request` onto an encoder
//! - [`WriteErrorPolicy`]: what happens when a single entry cannot be framed
//!
//! # Limitations
//!
//! The entry path is `namespace + "/" + name` with no escaping. A header key
//! containing `/` still encodes, but [`ArchiveEntry::namespace`] and
//! [`ArchiveEntry::name`] split on the first separator only.

pub mod encoder;
pub mod entry;
pub mod error;
pub mod policy;
pub mod reader;
pub mod serializer;
pub mod tar;

pub use encoder::{ArchiveEncoder, EntryCollector};
pub use entry::{ArchiveEntry, EntryFailure};
pub use error::{ArchiveError, ArchiveResult};
pub use policy::WriteErrorPolicy;
pub use reader::ArchiveReader;
pub use serializer::{RequestSerializer, BODY_NAME, BODY_NAMESPACE, HEADER_NAMESPACE};
pub use tar::{ArchiveBlob, TarEncoder, TarPartial, BLOCK_SIZE, DEFAULT_ENTRY_MODE};
