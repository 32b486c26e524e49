use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::naming::NameGenerator;
use crate::traits::ByteSink;

/// Default permission bits for sink files: owner read-only.
pub const DEFAULT_FILE_MODE: u32 = 0o400;

/// Default buffer size for [`BufferedFileSink`].
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// DurableFileSink
// ---------------------------------------------------------------------------

/// Writes each blob to a new file in one step.
///
/// The blob goes to a temporary file in the target directory, gets its
/// permission bits, and is then renamed onto the generated path. Other
/// readers see either no file or the complete blob. The rename refuses to
/// replace an existing file.
///
/// No fsync is issued unless [`Self::with_sync`] enables it; payloads are
/// expected to be self-checked (the tar framing ends with an explicit
/// end-of-archive marker), so a torn file is detectable on read.
#[derive(Debug)]
pub struct DurableFileSink<G> {
    names: G,
    mode: u32,
    sync: bool,
}

impl<G: NameGenerator> DurableFileSink<G> {
    pub fn new(names: G) -> Self {
        Self::with_mode(names, DEFAULT_FILE_MODE)
    }

    pub fn with_mode(names: G, mode: u32) -> Self {
        Self {
            names,
            mode,
            sync: false,
        }
    }

    /// Sync file contents to disk before the rename.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }
}

impl<G: NameGenerator> ByteSink for DurableFileSink<G> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        let path = self.names.next_path();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".reqsave-")
            .suffix(".partial")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        if self.sync {
            tmp.as_file().sync_all()?;
        }
        set_mode(tmp.as_file(), self.mode)?;
        tmp.persist_noclobber(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "blob written");
        Ok(bytes.len() as u64)
    }
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    file.set_permissions(perms)
}

// ---------------------------------------------------------------------------
// FileCreator
// ---------------------------------------------------------------------------

/// Opens and closes the files a [`BufferedFileSink`] writes.
pub trait FileCreator {
    type File: Write;

    fn create(&self, path: &Path) -> io::Result<Self::File>;

    /// Release the file. Errors surface to the caller of `save`.
    fn close(&self, file: Self::File) -> io::Result<()>;
}

/// Hand the descriptor to `close(2)` so its error reaches the caller.
/// Dropping a `File` discards that error.
#[cfg(unix)]
fn close_file(file: File) -> io::Result<()> {
    use std::os::fd::IntoRawFd;

    nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

/// Creates or truncates the target, like `File::create`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateFile;

impl FileCreator for CreateFile {
    type File = File;

    fn create(&self, path: &Path) -> io::Result<File> {
        File::create(path)
    }

    fn close(&self, file: File) -> io::Result<()> {
        close_file(file)
    }
}

/// Creates the target and fails if it already exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateNewFile;

impl FileCreator for CreateNewFile {
    type File = File;

    fn create(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    fn close(&self, file: File) -> io::Result<()> {
        close_file(file)
    }
}

// ---------------------------------------------------------------------------
// BufferedFileSink
// ---------------------------------------------------------------------------

/// Writes each blob to a new file through a buffered writer, without fsync.
///
/// The buffer is flushed to the OS before the file is closed; nothing forces
/// the data to stable storage, so a crash can leave a partial file behind.
/// Readers must validate what they find. The buffer is allocated per save.
#[derive(Debug)]
pub struct BufferedFileSink<G, C = CreateFile> {
    names: G,
    creator: C,
    capacity: usize,
}

impl<G: NameGenerator> BufferedFileSink<G, CreateFile> {
    pub fn new(names: G) -> Self {
        Self::with_creator(names, CreateFile)
    }
}

impl<G: NameGenerator, C: FileCreator> BufferedFileSink<G, C> {
    pub fn with_creator(names: G, creator: C) -> Self {
        Self {
            names,
            creator,
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl<G: NameGenerator, C: FileCreator> ByteSink for BufferedFileSink<G, C> {
    fn save(&self, bytes: &[u8]) -> StoreResult<u64> {
        let path = self.names.next_path();
        let file = self.creator.create(&path)?;

        let mut writer = BufWriter::with_capacity(self.capacity, file);
        let written = io::copy(&mut &bytes[..], &mut writer).and_then(|n| writer.flush().map(|()| n));
        let (file, _unflushed) = writer.into_parts();
        let closed = self.creator.close(file);

        match (written, closed) {
            (Ok(n), Ok(())) => {
                debug!(path = %path.display(), bytes = n, "blob written without sync");
                Ok(n)
            }
            (Err(write), Ok(())) => Err(StoreError::Io(write)),
            (Ok(_), Err(close)) => Err(StoreError::Io(close)),
            (Err(write), Err(close)) => Err(StoreError::WriteAndClose { write, close }),
        }
    }
}
