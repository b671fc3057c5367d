//! The client façade: one typed call per store operation.

use crate::admin::{AdminCommand, BackupOutcome, StoreStatus};
use crate::checksum::sum64;
use crate::error::{code, Error};
use crate::op::{
    CountResponse, DeleteResponse, ExistsResponse, GetResponse, SetRequest, SetResponse,
};
use crate::schema::{GrpcClient, Item, ListFilter};
use tonic::transport::{Channel, Endpoint};

/// Default cap on encoded and decoded message sizes: 64 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Connection configuration for a [`StoreClient`].
///
/// All configuration is explicit and travels with the client; there are no
/// ambient defaults beyond [`Default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Endpoint URI, e.g. `http://[::1]:50051`.
    pub endpoint: String,
    /// Cap applied to both encoded and decoded messages. Large payloads are
    /// supported up to this limit.
    pub max_message_size: usize,
    /// Shared admin secret. Only its checksum is ever transmitted.
    pub admin_secret: Vec<u8>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://[::1]:50051".to_owned(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            admin_secret: Vec::new(),
        }
    }
}

/// A connected client for the store service.
///
/// Every method issues exactly one request and surfaces any non-zero reply
/// code as a typed [`Error`] without retrying.
#[derive(Debug, Clone)]
pub struct StoreClient {
    /// The generated rpc client.
    inner: GrpcClient<Channel>,
    /// Checksum of the configured admin secret.
    secret_sum: u64,
}

impl StoreClient {
    /// Connect to the configured endpoint.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        let channel = Endpoint::try_from(config.endpoint.clone())?.connect().await?;
        Ok(Self::with_channel(channel, &config))
    }

    /// Wrap an already-established channel, applying the message-size caps.
    #[must_use]
    pub fn with_channel(channel: Channel, config: &ClientConfig) -> Self {
        let inner = GrpcClient::new(channel)
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);
        Self {
            inner,
            secret_sum: sum64(&config.admin_secret),
        }
    }

    /// Replace the admin secret used for subsequent admin calls.
    pub fn set_admin_secret(&mut self, secret: &[u8]) {
        self.secret_sum = sum64(secret);
    }

    /// Check that the store is reachable. No side effects.
    pub async fn ping(&mut self) -> Result<(), Error> {
        let reply = self.inner.ping(Item::default()).await?.into_inner();
        let _reply = check_reply(reply)?;
        Ok(())
    }

    /// Store `data` under `key`, computing its checksum.
    ///
    /// Overwrites any existing value; the store assigns the reply version.
    pub async fn set(
        &mut self,
        key: impl Into<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> Result<SetResponse, Error> {
        let request = SetRequest {
            key: key.into(),
            data: data.into(),
        };
        let reply = self.inner.set(Item::from(request)).await?.into_inner();
        Ok(check_reply(reply)?.into())
    }

    /// Store `data` under its content-derived key, which the store resolves
    /// and echoes back.
    pub async fn set_content(&mut self, data: impl Into<Vec<u8>>) -> Result<SetResponse, Error> {
        self.set(Vec::new(), data).await
    }

    /// Fetch the payload stored under `key`.
    pub async fn get(&mut self, key: impl Into<Vec<u8>>) -> Result<GetResponse, Error> {
        let request = Item {
            key: key.into(),
            ..Item::default()
        };
        let reply = self.inner.get(request).await?.into_inner();
        Ok(check_reply(reply)?.into())
    }

    /// Report whether `key` exists, without fetching its payload.
    pub async fn exists(&mut self, key: impl Into<Vec<u8>>) -> Result<ExistsResponse, Error> {
        let request = Item {
            key: key.into(),
            ..Item::default()
        };
        let reply = self.inner.exists(request).await?.into_inner();
        Ok(check_reply(reply)?.into())
    }

    /// Count keys matching `prefix`.
    pub async fn count(&mut self, prefix: impl Into<Vec<u8>>) -> Result<u64, Error> {
        let request = Item {
            key: prefix.into(),
            ..Item::default()
        };
        let reply = self.inner.count(request).await?.into_inner();
        Ok(CountResponse::try_from(check_reply(reply)?)?.count)
    }

    /// Remove `key`. Removing an absent key succeeds and reports zero bytes.
    pub async fn delete(&mut self, key: impl Into<Vec<u8>>) -> Result<DeleteResponse, Error> {
        let request = Item {
            key: key.into(),
            ..Item::default()
        };
        let reply = self.inner.delete(request).await?.into_inner();
        check_reply(reply)?.try_into()
    }

    /// Fetch one page of keys matching `prefix`. Pages are 1-based and sized
    /// by the store; an empty page signals the end of the results.
    pub async fn list(
        &mut self,
        prefix: impl Into<String>,
        pagenum: i32,
    ) -> Result<Vec<String>, Error> {
        let request = ListFilter {
            prefix: prefix.into(),
            pagenum,
        };
        Ok(self.inner.list(request).await?.into_inner().keys)
    }

    /// Fetch store statistics.
    pub async fn admin_status(&mut self) -> Result<StoreStatus, Error> {
        let reply = self.admin(&AdminCommand::Status).await?;
        Ok(serde_json::from_slice(&reply.data)?)
    }

    /// Flush pending writes to durable storage.
    pub async fn admin_sync(&mut self) -> Result<(), Error> {
        let _reply = self.admin(&AdminCommand::Sync).await?;
        Ok(())
    }

    /// Reclaim unused space.
    pub async fn admin_gc(&mut self) -> Result<(), Error> {
        let _reply = self.admin(&AdminCommand::Gc).await?;
        Ok(())
    }

    /// Write a backup to a file on the server.
    pub async fn admin_backup(
        &mut self,
        path: impl Into<String>,
        since: u64,
    ) -> Result<BackupOutcome, Error> {
        let reply = self
            .admin(&AdminCommand::Backup {
                path: path.into(),
                since,
            })
            .await?;
        Ok(serde_json::from_slice(&reply.data)?)
    }

    /// Restore the store from a backup file on the server.
    pub async fn admin_restore(&mut self, path: impl Into<String>) -> Result<BackupOutcome, Error> {
        let reply = self
            .admin(&AdminCommand::Restore { path: path.into() })
            .await?;
        Ok(serde_json::from_slice(&reply.data)?)
    }

    /// Ask the server to stop gracefully. The reply arrives before the server
    /// shuts down.
    pub async fn admin_stop(&mut self) -> Result<(), Error> {
        let _reply = self.admin(&AdminCommand::Stop).await?;
        Ok(())
    }

    /// Frame and issue an admin command: name in the key field, secret
    /// checksum in `sum64`, JSON arguments in the payload.
    async fn admin(&mut self, command: &AdminCommand) -> Result<Item, Error> {
        let request = Item {
            key: command.name().into(),
            data: command.payload()?,
            sum64: self.secret_sum,
            ..Item::default()
        };
        let reply = self.inner.admin(request).await?.into_inner();
        check_reply(reply)
    }
}

/// Reject replies carrying a non-zero `errcode`.
///
/// Reply fields must not be trusted until this check passes.
fn check_reply(item: Item) -> Result<Item, Error> {
    if item.errcode == code::SUCCESS {
        Ok(item)
    } else {
        Err(Error::from_reply(item.errcode, &item.status))
    }
}
