use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Produces the full path for the next file a sink writes.
///
/// Called once per save. Avoiding collisions is the generator's job.
pub trait NameGenerator {
    fn next_path(&self) -> PathBuf;
}

impl<F: Fn() -> PathBuf> NameGenerator for F {
    fn next_path(&self) -> PathBuf {
        self()
    }
}

/// `<dir>/<prefix><UTC timestamp>-<serial>.<extension>`
///
/// The serial is per generator and increases monotonically, so two names
/// from the same generator never collide even within one clock tick.
#[derive(Debug)]
pub struct TimestampNames {
    dir: PathBuf,
    prefix: String,
    extension: String,
    serial: AtomicU64,
}

impl TimestampNames {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
            serial: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl NameGenerator for TimestampNames {
    fn next_path(&self) -> PathBuf {
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        self.dir.join(format!(
            "{}{stamp}-{serial:08}.{}",
            self.prefix, self.extension
        ))
    }
}

/// `<dir>/<uuid v7>.<extension>`; names sort by creation time.
#[derive(Debug)]
pub struct UuidNames {
    dir: PathBuf,
    extension: String,
}

impl UuidNames {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }
}

impl NameGenerator for UuidNames {
    fn next_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", Uuid::now_v7(), self.extension))
    }
}
