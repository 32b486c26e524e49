//! ustar framing.
//!
//! Each entry is a 512-byte header block followed by its content padded to
//! the next block boundary. The archive ends with two zero blocks.
//!
//! ```text
//! offset  len  field
//!      0  100  name (NUL padded)
//!    100    8  mode      (octal, NUL terminated)
//!    108    8  uid
//!    116    8  gid
//!    124   12  size
//!    136   12  mtime
//!    148    8  checksum  (6 octal digits, NUL, space)
//!    156    1  typeflag  ('0' = regular file)
//!    257    6  magic     "ustar\0"
//!    263    2  version   "00"
//!    329    8  devmajor
//!    337    8  devminor
//!    345  155  prefix    (directory part of long names)
//! ```
//!
//! A path that fits neither the name field nor a prefix/name split is
//! carried in a PAX extended header (`x` entry holding a `path` record)
//! placed directly before the regular header, which keeps a truncated copy.

use tracing::debug;

use crate::encoder::ArchiveEncoder;
use crate::entry::{join_path, EntryFailure};
use crate::error::{ArchiveError, ArchiveResult};
use crate::policy::WriteErrorPolicy;

pub const BLOCK_SIZE: usize = 512;

/// Owner read-only.
pub const DEFAULT_ENTRY_MODE: u32 = 0o400;

pub(crate) const NAME_LEN: usize = 100;
pub(crate) const PREFIX_LEN: usize = 155;
pub(crate) const MAGIC: &[u8; 6] = b"ustar\0";
pub(crate) const REGULAR: u8 = b'0';
/// PAX extended header applying to the next entry.
pub(crate) const PAX_LOCAL: u8 = b'x';
pub(crate) const PAX_GLOBAL: u8 = b'g';
/// GNU long name applying to the next entry.
pub(crate) const GNU_LONG_NAME: u8 = b'L';
const PAX_HEADER_DIR: &str = "PaxHeaders";
/// Largest size representable in the 11-digit octal size field.
pub(crate) const MAX_CONTENT: u64 = 0o77_777_777_777;

pub(crate) mod field {
    use std::ops::Range;

    pub const NAME: Range<usize> = 0..100;
    pub const MODE: Range<usize> = 100..108;
    pub const UID: Range<usize> = 108..116;
    pub const GID: Range<usize> = 116..124;
    pub const SIZE: Range<usize> = 124..136;
    pub const MTIME: Range<usize> = 136..148;
    pub const CHECKSUM: Range<usize> = 148..156;
    pub const TYPEFLAG: usize = 156;
    pub const MAGIC: Range<usize> = 257..263;
    pub const VERSION: Range<usize> = 263..265;
    pub const DEVMAJOR: Range<usize> = 329..337;
    pub const DEVMINOR: Range<usize> = 337..345;
    pub const PREFIX: Range<usize> = 345..500;
}

/// A finished archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveBlob {
    pub bytes: Vec<u8>,
    /// Number of entries actually framed.
    pub entry_count: usize,
    /// Entries skipped under [`WriteErrorPolicy::Collect`].
    pub failures: Vec<EntryFailure>,
}

impl ArchiveBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<ArchiveBlob> for Vec<u8> {
    fn from(blob: ArchiveBlob) -> Self {
        blob.bytes
    }
}

/// In-progress tar archive.
#[derive(Debug, Default)]
pub struct TarPartial {
    buf: Vec<u8>,
    entry_count: usize,
    failures: Vec<EntryFailure>,
}

impl TarPartial {
    /// Bytes framed so far (no end-of-archive marker yet).
    pub fn framed_len(&self) -> usize {
        self.buf.len()
    }
}

/// ustar encoder with a configurable entry mode and failure policy.
#[derive(Clone, Copy, Debug)]
pub struct TarEncoder {
    policy: WriteErrorPolicy,
    mode: u32,
}

impl Default for TarEncoder {
    fn default() -> Self {
        Self::new(WriteErrorPolicy::default())
    }
}

impl TarEncoder {
    pub fn new(policy: WriteErrorPolicy) -> Self {
        Self {
            policy,
            mode: DEFAULT_ENTRY_MODE,
        }
    }

    /// Override the permission bits written to each entry.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode & 0o7777;
        self
    }

    pub fn policy(&self) -> WriteErrorPolicy {
        self.policy
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }
}

impl ArchiveEncoder for TarEncoder {
    type Partial = TarPartial;
    type Output = ArchiveBlob;

    fn initialize(&self) -> TarPartial {
        TarPartial::default()
    }

    fn write(
        &self,
        partial: &mut TarPartial,
        namespace: &str,
        name: &str,
        content: &[u8],
    ) -> ArchiveResult<()> {
        let path = join_path(namespace, name);
        // The header is built before anything is appended, so a rejected
        // entry leaves no bytes behind.
        let header = match frame_header(&path, content.len() as u64, self.mode) {
            Ok(h) => h,
            Err(e) => return self.policy.handle(&path, e, &mut partial.failures),
        };

        partial.buf.reserve(header.len() + padded_len(content.len()));
        partial.buf.extend_from_slice(&header);
        partial.buf.extend_from_slice(content);
        let pad = padded_len(content.len()) - content.len();
        partial.buf.resize(partial.buf.len() + pad, 0);
        partial.entry_count += 1;
        Ok(())
    }

    fn finalize(&self, mut partial: TarPartial) -> ArchiveResult<ArchiveBlob> {
        partial.buf.resize(partial.buf.len() + 2 * BLOCK_SIZE, 0);
        debug!(
            entries = partial.entry_count,
            bytes = partial.buf.len(),
            skipped = partial.failures.len(),
            "archive finalized"
        );
        Ok(ArchiveBlob {
            bytes: partial.buf,
            entry_count: partial.entry_count,
            failures: partial.failures,
        })
    }
}

/// Content length rounded up to a whole number of blocks.
pub(crate) fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Header bytes for a regular file at `path`: one ustar block, or a PAX
/// extended header followed by the ustar block when the path is too long.
pub(crate) fn frame_header(path: &str, size: u64, mode: u32) -> ArchiveResult<Vec<u8>> {
    if path.as_bytes().contains(&0) {
        return Err(ArchiveError::InvalidName {
            path: path.to_string(),
            reason: "contains NUL".into(),
        });
    }
    if path.ends_with('/') {
        return Err(ArchiveError::InvalidName {
            path: path.to_string(),
            reason: "empty name".into(),
        });
    }
    if size > MAX_CONTENT {
        return Err(ArchiveError::ContentTooLarge {
            path: path.to_string(),
            size,
        });
    }

    if let Some((prefix, name)) = split_path(path) {
        return Ok(header_block(prefix, name, size, mode, REGULAR).to_vec());
    }

    let record = pax_record("path", path);
    let short = truncate_name(path);
    let pax_name = format!("{PAX_HEADER_DIR}/{short}");
    let pax_name = truncate_name(&pax_name);
    debug!(path, len = path.len(), "path stored in pax header");

    let mut out = Vec::with_capacity(2 * BLOCK_SIZE + padded_len(record.len()));
    out.extend_from_slice(&header_block("", pax_name, record.len() as u64, mode, PAX_LOCAL));
    out.extend_from_slice(&record);
    out.resize(BLOCK_SIZE + padded_len(record.len()), 0);
    out.extend_from_slice(&header_block("", short, size, mode, REGULAR));
    Ok(out)
}

/// One ustar header block. `prefix` and `name` must already fit their fields.
pub(crate) fn header_block(prefix: &str, name: &str, size: u64, mode: u32, typeflag: u8) -> [u8; BLOCK_SIZE] {
    let mut h = [0u8; BLOCK_SIZE];
    h[field::NAME][..name.len()].copy_from_slice(name.as_bytes());
    write_octal(&mut h[field::MODE], u64::from(mode));
    write_octal(&mut h[field::UID], 0);
    write_octal(&mut h[field::GID], 0);
    write_octal(&mut h[field::SIZE], size);
    write_octal(&mut h[field::MTIME], 0);
    h[field::TYPEFLAG] = typeflag;
    h[field::MAGIC].copy_from_slice(MAGIC);
    h[field::VERSION].copy_from_slice(b"00");
    write_octal(&mut h[field::DEVMAJOR], 0);
    write_octal(&mut h[field::DEVMINOR], 0);
    h[field::PREFIX][..prefix.len()].copy_from_slice(prefix.as_bytes());

    let sum = header_checksum(&h);
    write_octal(&mut h[field::CHECKSUM][..7], sum);
    h[field::CHECKSUM.end - 1] = b' ';
    h
}

/// `"<len> <key>=<value>\n"`, where `<len>` counts the whole record including
/// its own digits.
fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let body = key.len() + value.len() + 3;
    let mut len = body;
    loop {
        let next = body + len.to_string().len();
        if next == len {
            break;
        }
        len = next;
    }
    format!("{len} {key}={value}\n").into_bytes()
}

/// Longest prefix of `path` that fits the name field on a char boundary.
fn truncate_name(path: &str) -> &str {
    let mut end = path.len().min(NAME_LEN);
    while !path.is_char_boundary(end) {
        end -= 1;
    }
    &path[..end]
}

/// Sum of all header bytes with the checksum field read as spaces.
pub(crate) fn header_checksum(h: &[u8]) -> u64 {
    h.iter()
        .enumerate()
        .map(|(i, &b)| {
            if field::CHECKSUM.contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(b)
            }
        })
        .sum()
}

/// Split a path into `(prefix, name)` fitting the ustar fields.
fn split_path(path: &str) -> Option<(&str, &str)> {
    if path.len() <= NAME_LEN {
        return Some(("", path));
    }
    path.match_indices('/')
        .map(|(i, _)| (&path[..i], &path[i + 1..]))
        .find(|(prefix, name)| {
            !prefix.is_empty() && !name.is_empty() && prefix.len() <= PREFIX_LEN && name.len() <= NAME_LEN
        })
}

/// Zero-padded octal digits followed by a NUL, filling `field`.
fn write_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let text = format!("{value:0digits$o}");
    field[..digits].copy_from_slice(&text.as_bytes()[text.len() - digits..]);
    field[digits] = 0;
}
