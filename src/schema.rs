//! Generated protobuf and gRPC types for the `store` package.

#[allow(
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    clippy::missing_docs_in_private_items,
    clippy::all,
    clippy::nursery
)]
pub(crate) mod proto {
    tonic::include_proto!("store");
}

pub use self::proto::store_server::{Store as StoreRpc, StoreServer};
pub use self::proto::{Item, ListFilter, ListReply};

pub(crate) use self::proto::store_client::StoreClient as GrpcClient;
