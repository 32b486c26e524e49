use crate::entry::ArchiveEntry;
use crate::error::ArchiveResult;
use crate::tar::DEFAULT_ENTRY_MODE;

/// Incremental archive encoder.
///
/// A blob is built by one `initialize`, any number of `write` calls, and one
/// `finalize`. `finalize` takes the partial state by value, so a partial can
/// be finalized at most once and cannot be written to afterwards.
pub trait ArchiveEncoder {
    /// In-progress archive state.
    type Partial;
    /// The finished archive.
    type Output;

    fn initialize(&self) -> Self::Partial;

    /// Append one entry at `namespace/name`.
    fn write(
        &self,
        partial: &mut Self::Partial,
        namespace: &str,
        name: &str,
        content: &[u8],
    ) -> ArchiveResult<()>;

    /// Close the archive and return it.
    fn finalize(&self, partial: Self::Partial) -> ArchiveResult<Self::Output>;
}

/// Encoder that keeps entries as decoded values instead of framing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntryCollector;

impl ArchiveEncoder for EntryCollector {
    type Partial = Vec<ArchiveEntry>;
    type Output = Vec<ArchiveEntry>;

    fn initialize(&self) -> Self::Partial {
        Vec::new()
    }

    fn write(
        &self,
        partial: &mut Self::Partial,
        namespace: &str,
        name: &str,
        content: &[u8],
    ) -> ArchiveResult<()> {
        partial.push(ArchiveEntry::new(
            namespace,
            name,
            content.to_vec(),
            DEFAULT_ENTRY_MODE,
        ));
        Ok(())
    }

    fn finalize(&self, partial: Self::Partial) -> ArchiveResult<Self::Output> {
        Ok(partial)
    }
}
