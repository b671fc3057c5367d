//! The gRPC service implementation.

use crate::admin::{AdminCommand, BackupOutcome, ParseError};
use crate::backend::StoreBackend;
use crate::checksum::{content_key, sum64};
use crate::error::code;
use crate::schema::{Item, ListFilter, ListReply, StoreRpc};
use crate::{Location, RpcResponse};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

/// How long `stop` waits before triggering shutdown, so the reply has time to
/// reach the caller.
const STOP_DELAY: Duration = Duration::from_millis(200);

/// The store service: a backend plus the checksum of the admin secret.
///
/// Application failures are reported in-band through the reply item's
/// `errcode`/`status` fields; transport-level [`Status`] errors are reserved
/// for faults in the transport itself.
#[derive(Debug)]
pub struct ItemStore<Backend> {
    /// The storage engine serving every operation.
    backend: Backend,
    /// Checksum of the shared admin secret. The secret itself is not kept.
    secret_sum: u64,
    /// Notified when an authenticated `stop` command arrives.
    shutdown: Option<Arc<Notify>>,
}

impl<Backend: StoreBackend> ItemStore<Backend> {
    /// Open a store at the given location.
    ///
    /// `admin_secret` gates the `Admin` rpc. Only its checksum is retained and
    /// compared; an empty secret checksums to `0`.
    pub fn at_location<L>(location: L, admin_secret: &[u8]) -> Result<Self, Backend::Error>
    where
        L: Into<Location>,
    {
        Ok(Self {
            backend: Backend::at_location(location.into())?,
            secret_sum: sum64(admin_secret),
            shutdown: None,
        })
    }

    /// Attach a shutdown handle, notified shortly after an authenticated
    /// `stop` command is accepted.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<Notify>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

/// A success reply echoing `key`, with every other field cleared.
fn reply(key: Vec<u8>) -> Item {
    Item {
        key,
        ..Item::default()
    }
}

/// An error reply. The data and version fields stay cleared so callers cannot
/// mistake them for results.
fn reject(errcode: i32, status: impl Into<Vec<u8>>) -> Item {
    Item {
        errcode,
        status: status.into(),
        ..Item::default()
    }
}

/// An internal-failure reply for a backend error.
fn internal(err: &impl Display) -> Item {
    warn!(error = %err, "backend failure");
    reject(code::INTERNAL, err.to_string())
}

#[tonic::async_trait]
impl<Backend: StoreBackend> StoreRpc for ItemStore<Backend> {
    async fn ping(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item { key, .. } = request.into_inner();
        Ok(Response::new(reply(key)))
    }

    async fn set(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item {
            key,
            data,
            sum64: declared,
            ..
        } = request.into_inner();

        if declared != sum64(&data) {
            return Ok(Response::new(reject(
                code::CHECKSUM_MISMATCH,
                "data does not match sum64",
            )));
        }

        // An empty key asks for content addressing.
        let key = if key.is_empty() {
            content_key(&data).into_bytes()
        } else {
            key
        };

        match self.backend.set(&key, &data, declared) {
            Ok(ver64) => {
                debug!(data_len = data.len(), ver64, "set");
                let mut item = reply(key);
                item.ver64 = ver64;
                Ok(Response::new(item))
            }
            Err(err) => Ok(Response::new(internal(&err))),
        }
    }

    async fn get(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item { key, .. } = request.into_inner();
        match self.backend.get(&key) {
            Ok(Some(record)) => {
                let mut item = reply(key);
                item.data = record.data;
                item.ver64 = record.ver64;
                item.sum64 = record.sum64;
                Ok(Response::new(item))
            }
            Ok(None) => Ok(Response::new(reject(code::NOT_FOUND, "key not found"))),
            Err(err) => Ok(Response::new(internal(&err))),
        }
    }

    async fn exists(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item { key, .. } = request.into_inner();
        match self.backend.exists(&key) {
            Ok(Some(ver64)) => {
                let mut item = reply(key);
                item.ver64 = ver64;
                // The payload is an existence marker, never the content.
                item.data = br#"{"mode":1}"#.to_vec();
                Ok(Response::new(item))
            }
            Ok(None) => Ok(Response::new(reject(code::NOT_FOUND, "key not found"))),
            Err(err) => Ok(Response::new(internal(&err))),
        }
    }

    async fn count(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item { key, .. } = request.into_inner();
        match self.backend.count(&key) {
            Ok(count) => {
                let mut item = reply(key);
                item.data = count.to_string().into_bytes();
                Ok(Response::new(item))
            }
            Err(err) => Ok(Response::new(internal(&err))),
        }
    }

    async fn delete(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item { key, .. } = request.into_inner();
        match self.backend.delete(&key) {
            Ok(bytes) => {
                debug!(bytes, "delete");
                let mut item = reply(key);
                item.data = bytes.to_string().into_bytes();
                Ok(Response::new(item))
            }
            Err(err) => Ok(Response::new(internal(&err))),
        }
    }

    async fn list(&self, request: Request<ListFilter>) -> RpcResponse<ListReply> {
        let ListFilter { prefix, pagenum } = request.into_inner();
        let pagenum = u32::try_from(pagenum).unwrap_or(1).max(1);
        // ListReply has no in-band error channel, so backend failures surface
        // as transport statuses here.
        let keys = self
            .backend
            .list(&prefix, pagenum)
            .map_err(|err| Status::internal(err.to_string()))?;
        Ok(Response::new(ListReply { keys }))
    }

    async fn admin(&self, request: Request<Item>) -> RpcResponse<Item> {
        let Item {
            key,
            data,
            sum64: declared,
            ..
        } = request.into_inner();

        // Authenticate before looking at the command at all.
        if declared != self.secret_sum {
            warn!("admin authentication failure");
            return Ok(Response::new(reject(
                code::AUTH_FAILURE,
                "incorrect admin secret",
            )));
        }

        let command = match AdminCommand::parse(&key, &data) {
            Ok(command) => command,
            Err(ParseError::Unknown(name)) => {
                return Ok(Response::new(reject(
                    code::UNKNOWN_COMMAND,
                    format!("unknown admin command: {name}"),
                )));
            }
            Err(ParseError::Args(message)) => {
                return Ok(Response::new(reject(code::INTERNAL, message)));
            }
        };

        info!(command = command.name(), "admin");
        let mut item = reply(command.name().into());
        match command {
            AdminCommand::Status => match self.backend.status() {
                Ok(status) => match serde_json::to_vec(&status) {
                    Ok(payload) => item.data = payload,
                    Err(err) => return Ok(Response::new(internal(&err))),
                },
                Err(err) => return Ok(Response::new(internal(&err))),
            },
            AdminCommand::Sync => {
                if let Err(err) = self.backend.sync() {
                    return Ok(Response::new(internal(&err)));
                }
            }
            AdminCommand::Gc => {
                if let Err(err) = self.backend.gc() {
                    return Ok(Response::new(internal(&err)));
                }
            }
            AdminCommand::Backup { path, since } => match self.backend.backup(&path, since) {
                Ok(target) => {
                    let outcome = BackupOutcome {
                        path,
                        since: since.to_string(),
                        target,
                    };
                    match serde_json::to_vec(&outcome) {
                        Ok(payload) => item.data = payload,
                        Err(err) => return Ok(Response::new(internal(&err))),
                    }
                }
                Err(err) => return Ok(Response::new(internal(&err))),
            },
            AdminCommand::Restore { path } => match self.backend.restore(&path) {
                Ok(()) => {
                    let outcome = BackupOutcome {
                        path,
                        since: "0".to_owned(),
                        target: "ok".to_owned(),
                    };
                    match serde_json::to_vec(&outcome) {
                        Ok(payload) => item.data = payload,
                        Err(err) => return Ok(Response::new(internal(&err))),
                    }
                }
                Err(err) => return Ok(Response::new(internal(&err))),
            },
            AdminCommand::Stop => {
                if let Some(shutdown) = self.shutdown.clone() {
                    info!("stop accepted, shutting down");
                    let _task = tokio::spawn(async move {
                        tokio::time::sleep(STOP_DELAY).await;
                        shutdown.notify_one();
                    });
                } else {
                    item.status = "no shutdown handle installed".into();
                }
            }
        }
        Ok(Response::new(item))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod test {
    use super::*;
    use crate::admin::StoreStatus;
    use crate::backend::Sqlite;

    const SECRET: &[u8] = b"test-secret";

    fn store() -> ItemStore<Sqlite> {
        ItemStore::at_location(Location::InMemory, SECRET).unwrap()
    }

    fn item(key: &[u8], data: &[u8]) -> Item {
        Item {
            key: key.to_vec(),
            data: data.to_vec(),
            sum64: sum64(data),
            ..Item::default()
        }
    }

    fn admin_item(command: &[u8], data: &[u8], secret: &[u8]) -> Item {
        Item {
            key: command.to_vec(),
            data: data.to_vec(),
            sum64: sum64(secret),
            ..Item::default()
        }
    }

    #[tokio::test]
    async fn set_get_delete_scenario() {
        let store = store();

        let set = store
            .set(Request::new(item(b"k1", b"hello")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(set.errcode, code::SUCCESS);
        assert_eq!(set.key, b"k1");
        assert_eq!(set.ver64, 1);

        let get = store
            .get(Request::new(item(b"k1", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(get.errcode, code::SUCCESS);
        assert_eq!(get.data, b"hello");
        assert_eq!(get.sum64, sum64(b"hello"));

        let deleted = store
            .delete(Request::new(item(b"k1", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(deleted.errcode, code::SUCCESS);
        assert_eq!(deleted.data, b"5");

        let missing = store
            .get(Request::new(item(b"k1", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(missing.errcode, code::NOT_FOUND);
    }

    #[tokio::test]
    async fn set_rejects_checksum_mismatch() {
        let store = store();
        let mut request = item(b"k", b"payload");
        request.sum64 ^= 1;

        let response = store.set(Request::new(request)).await.unwrap().into_inner();
        assert_eq!(response.errcode, code::CHECKSUM_MISMATCH);
        assert!(response.data.is_empty());

        let missing = store
            .get(Request::new(item(b"k", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(missing.errcode, code::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_key_derives_content_key() {
        let store = store();
        let response = store
            .set(Request::new(item(b"", b"payload")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.errcode, code::SUCCESS);
        assert_eq!(response.key, content_key(b"payload").into_bytes());

        let get = store
            .get(Request::new(item(&response.key, b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(get.data, b"payload");
    }

    #[tokio::test]
    async fn exists_reports_version_not_content() {
        let store = store();
        let _set = store.set(Request::new(item(b"k", b"value"))).await.unwrap();

        let exists = store
            .exists(Request::new(item(b"k", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(exists.errcode, code::SUCCESS);
        assert_eq!(exists.ver64, 1);
        assert_ne!(exists.data, b"value");

        let missing = store
            .exists(Request::new(item(b"absent", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(missing.errcode, code::NOT_FOUND);
    }

    #[tokio::test]
    async fn count_and_list_use_the_key_as_prefix() {
        let store = store();
        for key in [&b"app/a"[..], b"app/b", b"web/a"] {
            let _set = store.set(Request::new(item(key, b"x"))).await.unwrap();
        }

        let count = store
            .count(Request::new(item(b"app/", b"")))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(count.errcode, code::SUCCESS);
        assert_eq!(count.data, b"2");

        let listed = store
            .list(Request::new(ListFilter {
                prefix: String::new(),
                pagenum: 1,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(listed.keys, ["app/a", "app/b", "web/a"]);

        let empty = store
            .list(Request::new(ListFilter {
                prefix: String::new(),
                pagenum: 2,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(empty.keys.is_empty());
    }

    #[tokio::test]
    async fn admin_rejects_wrong_secret_for_every_command() {
        let store = store();
        for command in [&b"status"[..], b"sync", b"gc", b"backup", b"stop", b"nonsense"] {
            let response = store
                .admin(Request::new(admin_item(command, b"", b"wrong")))
                .await
                .unwrap()
                .into_inner();
            assert_eq!(response.errcode, code::AUTH_FAILURE, "command {command:?}");
        }
    }

    #[tokio::test]
    async fn admin_rejects_unknown_commands() {
        let store = store();
        let response = store
            .admin(Request::new(admin_item(b"nonsense", b"", SECRET)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.errcode, code::UNKNOWN_COMMAND);
        assert!(!response.status.is_empty());
    }

    #[tokio::test]
    async fn admin_status_reports_store_statistics() {
        let store = store();
        let _set = store.set(Request::new(item(b"k1", b"v"))).await.unwrap();
        let _set = store.set(Request::new(item(b"k2", b"v"))).await.unwrap();

        let response = store
            .admin(Request::new(admin_item(b"status", b"", SECRET)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.errcode, code::SUCCESS);

        let status: StoreStatus = serde_json::from_slice(&response.data).unwrap();
        assert_eq!(status.key_count, 2);
        assert_eq!(status.max_version, 2);
    }

    #[tokio::test]
    async fn admin_sync_and_gc_reply_empty() {
        let store = store();
        for command in [&b"sync"[..], b"gc"] {
            let response = store
                .admin(Request::new(admin_item(command, b"", SECRET)))
                .await
                .unwrap()
                .into_inner();
            assert_eq!(response.errcode, code::SUCCESS);
            assert!(response.data.is_empty());
        }
    }

    #[tokio::test]
    async fn admin_backup_args_must_be_valid() {
        let store = store();
        let response = store
            .admin(Request::new(admin_item(b"backup", b"not json", SECRET)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.errcode, code::INTERNAL);
    }

    #[tokio::test]
    async fn admin_stop_without_handle_still_succeeds() {
        let store = store();
        let response = store
            .admin(Request::new(admin_item(b"stop", b"", SECRET)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.errcode, code::SUCCESS);
        assert_eq!(response.status, b"no shutdown handle installed");
    }
}
