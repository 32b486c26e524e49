use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entry::EntryFailure;
use crate::error::{ArchiveError, ArchiveResult};

/// How an encoder reacts when one entry cannot be framed.
///
/// Only the failing entry is affected: nothing of it is written, and under
/// every policy except `Abort` and `Fatal` the archive keeps accepting
/// entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteErrorPolicy {
    /// Return the error; the serializer stops and propagates it.
    #[default]
    Abort,
    /// Drop the entry and log a warning.
    Ignore,
    /// Drop the entry and record it in the finished blob.
    Collect,
    /// Panic. Opt-in strict mode.
    Fatal,
}

impl WriteErrorPolicy {
    pub(crate) fn handle(
        self,
        path: &str,
        err: ArchiveError,
        failures: &mut Vec<EntryFailure>,
    ) -> ArchiveResult<()> {
        match self {
            Self::Abort => Err(err),
            Self::Ignore => {
                warn!(path, error = %err, "archive entry skipped");
                Ok(())
            }
            Self::Collect => {
                warn!(path, error = %err, "archive entry skipped and recorded");
                failures.push(EntryFailure {
                    path: path.to_string(),
                    reason: err.to_string(),
                });
                Ok(())
            }
            Self::Fatal => panic!("archive entry {path} could not be written: {err}"),
        }
    }
}
