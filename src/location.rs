use std::path::PathBuf;

/// Where a store keeps its data.
#[non_exhaustive] // future-proofing for options like network storage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// An in-memory store. Useful for short-lived data and tests.
    InMemory,
    /// A store backed by a file on disk.
    OnDisk {
        /// The path to the database file. This is permitted to be a path on a
        /// network file system, if desired.
        path: PathBuf,
    },
}

impl<T> From<T> for Location
where
    T: Into<PathBuf>,
{
    fn from(path: T) -> Self {
        Self::OnDisk { path: path.into() }
    }
}
