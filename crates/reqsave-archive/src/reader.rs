use crate::entry::ArchiveEntry;
use crate::error::{ArchiveError, ArchiveResult};
use crate::serializer::{BODY_NAME, BODY_NAMESPACE, HEADER_NAMESPACE};
use crate::tar::{
    field, header_checksum, padded_len, BLOCK_SIZE, GNU_LONG_NAME, MAGIC, PAX_GLOBAL, PAX_LOCAL, REGULAR,
};

/// Decodes tar blobs produced by [`crate::TarEncoder`].
///
/// Entries are returned in archive order. Duplicate paths are kept: a header
/// with several values appears once per value. PAX `path` records and GNU
/// long-name entries override the name of the entry that follows them.
#[derive(Clone, Debug, Default)]
pub struct ArchiveReader {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveReader {
    /// Decode every entry in `bytes`.
    ///
    /// Fails on a header checksum mismatch, a malformed numeric field, or a
    /// blob that ends before the two-block end-of-archive marker.
    pub fn from_bytes(bytes: &[u8]) -> ArchiveResult<Self> {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        let mut long_path: Option<String> = None;

        loop {
            let block = block_at(bytes, offset)?;
            if is_zero_block(block) {
                let next = block_at(bytes, offset + BLOCK_SIZE)?;
                if is_zero_block(next) {
                    break;
                }
                return Err(ArchiveError::CorruptHeader {
                    offset: offset + BLOCK_SIZE,
                    reason: "entry after single zero block".into(),
                });
            }

            let stored = parse_octal(&block[field::CHECKSUM], offset, "checksum")?;
            let computed = header_checksum(block);
            if stored != computed {
                return Err(ArchiveError::ChecksumMismatch {
                    offset,
                    stored,
                    computed,
                });
            }

            let size = parse_octal(&block[field::SIZE], offset, "size")?;
            let size = usize::try_from(size).map_err(|_| ArchiveError::CorruptHeader {
                offset,
                reason: format!("size {size} exceeds address space"),
            })?;
            let mode = parse_octal(&block[field::MODE], offset, "mode")? as u32;

            let data_start = offset + BLOCK_SIZE;
            let data_end = data_start
                .checked_add(size)
                .filter(|&end| end <= bytes.len())
                .ok_or(ArchiveError::Truncated { offset: data_start })?;

            let data = &bytes[data_start..data_end];
            match block[field::TYPEFLAG] {
                REGULAR | 0 => {
                    let path = match long_path.take() {
                        Some(path) => path,
                        None => entry_path(block, offset)?,
                    };
                    entries.push(ArchiveEntry {
                        path,
                        mode,
                        content: data.to_vec(),
                    });
                }
                PAX_LOCAL => {
                    if let Some(path) = pax_path(data, data_start)? {
                        long_path = Some(path);
                    }
                }
                GNU_LONG_NAME => long_path = Some(utf8_name(nul_terminated(data), data_start)?),
                PAX_GLOBAL => {}
                _ => long_path = None,
            }

            offset = data_start + padded_len(size);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ArchiveEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry whose path equals `path`, in archive order.
    pub fn find_all<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ArchiveEntry> + 'a {
        self.entries.iter().filter(move |e| e.path == path)
    }

    /// All values recorded for header `name`.
    pub fn header_values(&self, name: &str) -> Vec<&[u8]> {
        self.entries
            .iter()
            .filter(|e| e.namespace() == HEADER_NAMESPACE && e.name() == name)
            .map(|e| e.content.as_slice())
            .collect()
    }

    /// The first value recorded for header `name`.
    pub fn first_header(&self, name: &str) -> Option<&[u8]> {
        self.header_values(name).into_iter().next()
    }

    /// The captured body, if the archive has a `body/body` entry.
    pub fn body(&self) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.namespace() == BODY_NAMESPACE && e.name() == BODY_NAME)
            .map(|e| e.content.as_slice())
    }
}

fn block_at(bytes: &[u8], offset: usize) -> ArchiveResult<&[u8]> {
    bytes
        .get(offset..offset + BLOCK_SIZE)
        .ok_or(ArchiveError::Truncated { offset })
}

fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn parse_octal(raw: &[u8], offset: usize, what: &str) -> ArchiveResult<u64> {
    let text = std::str::from_utf8(raw)
        .ok()
        .map(|s| s.trim_matches(|c: char| c == '\0' || c == ' '))
        .ok_or_else(|| ArchiveError::CorruptHeader {
            offset,
            reason: format!("{what} field is not ASCII"),
        })?;
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8).map_err(|e| ArchiveError::CorruptHeader {
        offset,
        reason: format!("{what} field {text:?}: {e}"),
    })
}

fn nul_terminated(raw: &[u8]) -> &[u8] {
    raw.iter().position(|&b| b == 0).map_or(raw, |n| &raw[..n])
}

fn entry_path(block: &[u8], offset: usize) -> ArchiveResult<String> {
    let name = nul_terminated(&block[field::NAME]);
    let prefix = if &block[field::MAGIC] == MAGIC {
        nul_terminated(&block[field::PREFIX])
    } else {
        &[]
    };

    let mut raw = Vec::with_capacity(prefix.len() + 1 + name.len());
    if !prefix.is_empty() {
        raw.extend_from_slice(prefix);
        raw.push(b'/');
    }
    raw.extend_from_slice(name);
    utf8_name(&raw, offset)
}

fn utf8_name(raw: &[u8], offset: usize) -> ArchiveResult<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| ArchiveError::CorruptHeader {
        offset,
        reason: "entry name is not UTF-8".into(),
    })
}

/// The `path` value of a PAX extended header, if it has one.
///
/// Records are `"<len> <key>=<value>\n"` with `<len>` covering the whole
/// record. Other keys are skipped.
fn pax_path(data: &[u8], offset: usize) -> ArchiveResult<Option<String>> {
    let corrupt = |reason: &str| ArchiveError::CorruptHeader {
        offset,
        reason: reason.to_string(),
    };

    let mut path = None;
    let mut rest = data;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| corrupt("pax record has no length"))?;
        let len: usize = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| corrupt("pax record length is not a number"))?;
        if len <= space + 1 || len > rest.len() || rest[len - 1] != b'\n' {
            return Err(corrupt("pax record length out of range"));
        }

        let record = &rest[space + 1..len - 1];
        let eq = record
            .iter()
            .position(|&b| b == b'=')
            .ok_or_else(|| corrupt("pax record has no '='"))?;
        if &record[..eq] == b"path" {
            path = Some(utf8_name(&record[eq + 1..], offset)?);
        }
        rest = &rest[len..];
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::ArchiveEncoder;
    use crate::policy::WriteErrorPolicy;
    use crate::tar::{header_block, TarEncoder};
    use proptest::prelude::*;

    fn build(entries: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
        let enc = TarEncoder::new(WriteErrorPolicy::Abort);
        let mut p = enc.initialize();
        for (ns, name, content) in entries {
            enc.write(&mut p, ns, name, content).unwrap();
        }
        enc.finalize(p).unwrap().bytes
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let reader = ArchiveReader::from_bytes(&build(&[])).unwrap();
        assert!(reader.is_empty());
        assert!(reader.body().is_none());
    }

    #[test]
    fn duplicate_header_names_are_all_returned() {
        let bytes = build(&[
            ("header", "Accept", b"text/html".to_vec()),
            ("header", "Accept", b"application/json".to_vec()),
            ("body", "body", Vec::new()),
        ]);
        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        assert_eq!(
            reader.header_values("Accept"),
            vec![b"text/html".as_slice(), b"application/json".as_slice()]
        );
        assert_eq!(reader.first_header("Accept"), Some(b"text/html".as_slice()));
        assert_eq!(reader.find_all("header/Accept").count(), 2);
        assert_eq!(reader.body(), Some(b"".as_slice()));
    }

    #[test]
    fn mode_is_decoded() {
        let reader = ArchiveReader::from_bytes(&build(&[("body", "body", b"x".to_vec())])).unwrap();
        assert_eq!(reader.entries()[0].mode, 0o400);
    }

    #[test]
    fn long_path_roundtrips_through_prefix() {
        let name = format!("{}/{}", "a".repeat(50), "b".repeat(80));
        let bytes = build(&[("header", name.as_str(), b"v".to_vec())]);
        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.entries()[0].path, format!("header/{name}"));
        assert_eq!(reader.entries()[0].name(), name);
    }

    #[test]
    fn long_header_name_roundtrips_through_pax() {
        let name = format!("X-Trace-{}", "k".repeat(120));
        assert!(name.len() >= 101);
        let bytes = build(&[
            ("header", name.as_str(), b"first".to_vec()),
            ("header", "Host", b"example.org".to_vec()),
            ("body", "body", b"payload".to_vec()),
        ]);
        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        let paths: Vec<&str> = reader.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, [format!("header/{name}").as_str(), "header/Host", "body/body"]);
        assert_eq!(reader.first_header(&name), Some(b"first".as_slice()));
        assert_eq!(reader.entries()[0].mode, 0o400);
        assert_eq!(reader.body(), Some(b"payload".as_slice()));
    }

    #[test]
    fn multibyte_long_name_roundtrips() {
        let name = "\u{e9}".repeat(90);
        let bytes = build(&[("header", name.as_str(), b"v".to_vec())]);
        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.entries()[0].name(), name);
    }

    #[test]
    fn gnu_long_name_overrides_next_entry() {
        let path = format!("header/{}", "g".repeat(130));
        let mut long = path.clone().into_bytes();
        long.push(0);

        let mut bytes = header_block("", "././@LongLink", long.len() as u64, 0o644, GNU_LONG_NAME).to_vec();
        bytes.extend_from_slice(&long);
        bytes.resize(BLOCK_SIZE + padded_len(long.len()), 0);
        bytes.extend_from_slice(&header_block("", &path[..100], 2, 0o400, REGULAR));
        bytes.extend_from_slice(b"ok");
        bytes.resize(bytes.len() + BLOCK_SIZE - 2 + 2 * BLOCK_SIZE, 0);

        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.entries()[0].path, path);
        assert_eq!(reader.entries()[0].content, b"ok");
    }

    #[test]
    fn pax_override_applies_to_one_entry_only() {
        let name = "p".repeat(140);
        let bytes = build(&[
            ("header", name.as_str(), b"1".to_vec()),
            ("header", "Short", b"2".to_vec()),
        ]);
        let reader = ArchiveReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.entries()[1].path, "header/Short");
    }

    #[test]
    fn malformed_pax_record_is_corrupt() {
        let record = b"99 path=short\n";
        let mut bytes = header_block("", "PaxHeaders/x", record.len() as u64, 0o400, PAX_LOCAL).to_vec();
        bytes.extend_from_slice(record);
        bytes.resize(2 * BLOCK_SIZE, 0);
        bytes.extend_from_slice(&header_block("", "x", 0, 0o400, REGULAR));
        bytes.resize(bytes.len() + 2 * BLOCK_SIZE, 0);

        let err = ArchiveReader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptHeader { offset, .. } if offset == BLOCK_SIZE));
    }

    #[test]
    fn missing_end_marker_is_truncated() {
        let mut bytes = build(&[("body", "body", b"abc".to_vec())]);
        bytes.truncate(bytes.len() - 2 * BLOCK_SIZE);
        let err = ArchiveReader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { .. }));
    }

    #[test]
    fn short_content_is_truncated() {
        let mut bytes = build(&[("body", "body", vec![1u8; 600])]);
        bytes.truncate(BLOCK_SIZE + 100);
        let err = ArchiveReader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { offset } if offset == BLOCK_SIZE));
    }

    #[test]
    fn flipped_header_byte_fails_checksum() {
        let mut bytes = build(&[("body", "body", b"abc".to_vec())]);
        bytes[3] ^= 0x20;
        let err = ArchiveReader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::ChecksumMismatch { offset: 0, .. }));
    }

    #[test]
    fn garbage_size_field_is_corrupt() {
        let mut bytes = build(&[("body", "body", b"abc".to_vec())]);
        bytes[124] = b'9';
        let sum = header_checksum(&bytes[..BLOCK_SIZE]);
        let text = format!("{sum:06o}\0 ");
        bytes[148..156].copy_from_slice(text.as_bytes());
        let err = ArchiveReader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptHeader { .. }));
    }

    proptest! {
        #[test]
        fn decoded_entries_match_written(
            entries in proptest::collection::vec(
                ("[A-Za-z][A-Za-z0-9-]{0,30}", proptest::collection::vec(any::<u8>(), 0..1500)),
                0..8,
            )
        ) {
            let enc = TarEncoder::default();
            let mut p = enc.initialize();
            for (name, content) in &entries {
                enc.write(&mut p, "header", name, content).unwrap();
            }
            let bytes = enc.finalize(p).unwrap().bytes;

            let decoded = ArchiveReader::from_bytes(&bytes).unwrap().into_entries();
            prop_assert_eq!(decoded.len(), entries.len());
            for (d, (name, content)) in decoded.iter().zip(entries.iter()) {
                prop_assert_eq!(d.name(), name.as_str());
                prop_assert_eq!(&d.content, content);
            }
        }
    }
}
