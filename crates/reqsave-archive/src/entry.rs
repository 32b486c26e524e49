/// A decoded archive entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full entry path, `namespace/name`.
    pub path: String,
    /// Permission bits recorded in the entry header.
    pub mode: u32,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(namespace: &str, name: &str, content: Vec<u8>, mode: u32) -> Self {
        Self {
            path: join_path(namespace, name),
            mode,
            content,
        }
    }

    /// Everything before the first `/`, or the whole path if there is none.
    pub fn namespace(&self) -> &str {
        self.path.split_once('/').map_or(self.path.as_str(), |(ns, _)| ns)
    }

    /// Everything after the first `/`, or `""` if there is none.
    pub fn name(&self) -> &str {
        self.path.split_once('/').map_or("", |(_, name)| name)
    }
}

/// An entry that was skipped under [`crate::WriteErrorPolicy::Collect`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFailure {
    pub path: String,
    pub reason: String,
}

pub(crate) fn join_path(namespace: &str, name: &str) -> String {
    let mut path = String::with_capacity(namespace.len() + 1 + name.len());
    path.push_str(namespace);
    path.push('/');
    path.push_str(name);
    path
}
