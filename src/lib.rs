//! Checksummed, content-addressable key-value storage over gRPC.
//!
//! Every stored item carries a 64-bit content checksum ([`sum64`]) and a
//! store-assigned version counter. The wire protocol multiplexes eight
//! operations (`Ping`, `Set`, `Get`, `Exists`, `Count`, `Delete`, `List`,
//! `Admin`) over a single item shape; [`StoreClient`] exposes each of them as a
//! typed call, and [`ItemStore`] serves them over any [`backend::StoreBackend`].
//!
//! Administrative commands (status, sync, gc, backup, restore, stop) travel
//! through the same `Admin` rpc, authenticated by the checksum of a shared
//! secret. The secret itself never crosses the wire.

pub mod admin;
pub mod backend;
mod checksum;
pub mod client;
mod error;
mod location;
pub mod op;
mod schema;
mod store;
pub mod transitive;

/// A response from an RPC, either a reply or a transport-level status.
pub type RpcResponse<T> = Result<tonic::Response<T>, tonic::Status>;

pub use crate::admin::{AdminCommand, BackupOutcome, StoreStatus};
pub use crate::checksum::{content_key, sum64};
pub use crate::client::{ClientConfig, StoreClient, DEFAULT_MAX_MESSAGE_SIZE};
pub use crate::error::{code, Error};
pub use crate::location::Location;
pub use crate::schema::{Item, ListFilter, ListReply, StoreRpc, StoreServer};
pub use crate::store::ItemStore;
