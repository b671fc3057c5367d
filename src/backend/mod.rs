//! Storage engines backing the gRPC service.

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use self::sqlite::Sqlite;

use crate::admin::StoreStatus;
use crate::Location;

/// Keys returned per `List` page. Never exposed on the wire; clients must
/// treat the page size as opaque.
pub(crate) const PAGE_SIZE: usize = 1000;

mod sealed {
    pub trait Sealed {}
    #[cfg(feature = "sqlite")]
    impl Sealed for super::Sqlite {}
}

/// A stored payload together with its version and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The stored bytes.
    pub data: Vec<u8>,
    /// The version assigned when the record was written.
    pub ver64: u64,
    /// The checksum of `data` as stored.
    pub sum64: u64,
}

/// A storage engine able to serve the full operation set.
///
/// Versions are store-wide and monotonic: every successful write is assigned
/// the next version, including overwrites of an existing key.
pub trait StoreBackend: sealed::Sealed + Send + Sync + Sized + 'static {
    /// Engine-specific failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open (or create) a store at the given location.
    fn at_location(location: Location) -> Result<Self, Self::Error>;

    /// Where this store keeps its data.
    fn location(&self) -> &Location;

    /// Fetch a record by exact key.
    fn get(&self, key: &[u8]) -> Result<Option<Record>, Self::Error>;

    /// Write a record, returning the assigned version.
    fn set(&self, key: &[u8], data: &[u8], sum64: u64) -> Result<u64, Self::Error>;

    /// Remove a key, returning the size of the removed payload in bytes.
    /// Removing an absent key succeeds and reports zero.
    fn delete(&self, key: &[u8]) -> Result<u64, Self::Error>;

    /// The version of a key, if present.
    fn exists(&self, key: &[u8]) -> Result<Option<u64>, Self::Error>;

    /// Count keys matching a byte prefix.
    fn count(&self, prefix: &[u8]) -> Result<u64, Self::Error>;

    /// One page of keys matching a prefix, in key order. Pages are 1-based;
    /// an empty page signals the end of the results.
    fn list(&self, prefix: &str, pagenum: u32) -> Result<Vec<String>, Self::Error>;

    /// Store-wide statistics.
    fn status(&self) -> Result<StoreStatus, Self::Error>;

    /// Flush pending writes to durable storage.
    fn sync(&self) -> Result<(), Self::Error>;

    /// Reclaim unused space.
    fn gc(&self) -> Result<(), Self::Error>;

    /// Write a backup to `path`, returning the path of the file written.
    fn backup(&self, path: &str, since: u64) -> Result<String, Self::Error>;

    /// Replace the store contents from a backup at `path`.
    fn restore(&self, path: &str) -> Result<(), Self::Error>;
}
