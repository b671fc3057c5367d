//! Typed request/response pairs for each store operation.
//!
//! The wire protocol reuses one [`Item`] shape for every call. These types give
//! each operation compile-time field expectations and own the conversion to and
//! from the wire shape, so nothing else in the crate pokes at loose fields.

use crate::checksum::sum64;
use crate::error::Error;
use crate::schema::Item;

/// Request to store a payload under a key.
///
/// An empty key asks the store to resolve a content-derived key. The checksum
/// is computed here; callers never populate `sum64` by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    /// The lookup key, or empty for content addressing.
    pub key: Vec<u8>,
    /// The payload to store.
    pub data: Vec<u8>,
}

impl From<SetRequest> for Item {
    fn from(request: SetRequest) -> Self {
        let sum64 = sum64(&request.data);
        Self {
            key: request.key,
            data: request.data,
            sum64,
            ..Self::default()
        }
    }
}

/// Reply to a successful `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResponse {
    /// The resolved key the payload was stored under.
    pub key: Vec<u8>,
    /// The version assigned by the store.
    pub ver64: u64,
}

impl From<Item> for SetResponse {
    fn from(item: Item) -> Self {
        Self {
            key: item.key,
            ver64: item.ver64,
        }
    }
}

/// Reply to a successful `Get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    /// The stored payload.
    pub data: Vec<u8>,
    /// The version assigned when the payload was written.
    pub ver64: u64,
    /// The checksum of `data` as stored.
    pub sum64: u64,
}

impl From<Item> for GetResponse {
    fn from(item: Item) -> Self {
        Self {
            data: item.data,
            ver64: item.ver64,
            sum64: item.sum64,
        }
    }
}

/// Reply to a successful `Exists`.
///
/// The payload is an existence marker, never the stored content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsResponse {
    /// The version of the existing key.
    pub ver64: u64,
    /// The store-defined marker bytes.
    pub marker: Vec<u8>,
}

impl From<Item> for ExistsResponse {
    fn from(item: Item) -> Self {
        Self {
            ver64: item.ver64,
            marker: item.data,
        }
    }
}

/// Reply to a successful `Delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResponse {
    /// The key that was removed.
    pub key: Vec<u8>,
    /// Size in bytes of the removed payload; zero when the key was absent.
    pub bytes: u64,
}

impl TryFrom<Item> for DeleteResponse {
    type Error = Error;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        let bytes = decimal(&item.data)?;
        Ok(Self {
            key: item.key,
            bytes,
        })
    }
}

/// Reply to a successful `Count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountResponse {
    /// Number of keys matching the requested prefix.
    pub count: u64,
}

impl TryFrom<Item> for CountResponse {
    type Error = Error;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        Ok(Self {
            count: decimal(&item.data)?,
        })
    }
}

/// Parse the decimal string carried in a reply data field. Empty means zero.
fn decimal(data: &[u8]) -> Result<u64, Error> {
    if data.is_empty() {
        return Ok(0);
    }
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            Error::Malformed(format!(
                "expected a decimal count, got {:?}",
                String::from_utf8_lossy(data)
            ))
        })
}
