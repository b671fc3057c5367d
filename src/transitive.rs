//! In-process client/server pairs over a duplex stream.
//!
//! Useful for tests, benchmarks, and one-shot CLI commands where standing up a
//! network server is overkill. The server half honors `stop` like a real one.

use crate::backend::StoreBackend;
use crate::client::{ClientConfig, StoreClient};
use crate::error::Error;
use crate::schema::StoreServer;
use crate::store::ItemStore;
use crate::Location;
use hyper_util::rt::TokioIo;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_stream::StreamExt as _;
use tonic::transport::{Endpoint, Server};

/// Size of the in-memory duplex pipe.
const DUPLEX_SIZE: usize = 1024;

/// A client whose server runs in the same process.
#[derive(Debug)]
pub struct Transitive<T> {
    /// The wrapped client.
    client: T,
}

impl<T> Deref for Transitive<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl<T> DerefMut for Transitive<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

/// Spawn an in-process store and connect a client to it.
///
/// The server and client share `config`: the admin secret gates the server's
/// `Admin` rpc and authenticates the client's admin calls, and the
/// message-size cap applies on both sides. The configured endpoint is ignored;
/// traffic stays on the duplex pipe.
pub async fn store_client<L, Backend>(
    location: L,
    config: ClientConfig,
) -> Result<Transitive<StoreClient>, Error>
where
    L: Into<Location> + Send,
    Backend: StoreBackend,
{
    let shutdown = Arc::new(Notify::new());
    let store = ItemStore::<Backend>::at_location(location.into(), &config.admin_secret)
        .map_err(|err| Error::Backend(err.to_string()))?
        .with_shutdown(Arc::clone(&shutdown));

    let (client_io, server_io) = tokio::io::duplex(DUPLEX_SIZE);

    let max_message_size = config.max_message_size;
    let _join_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(
                StoreServer::new(store)
                    .max_decoding_message_size(max_message_size)
                    .max_encoding_message_size(max_message_size),
            )
            .serve_with_incoming_shutdown(
                // Keep the stream pending after the lone connection: if it
                // ended, tonic would treat that as a graceful shutdown and
                // close the connection before any request is served.
                tokio_stream::once(Ok::<_, std::io::Error>(server_io))
                    .chain(tokio_stream::pending()),
                async move { shutdown.notified().await },
            )
            .await
    });

    let mut client_io = Some(client_io);
    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(tower::service_fn(move |_| {
            let client_io = client_io.take();
            async move {
                client_io.map(TokioIo::new).ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "client already taken")
                })
            }
        }))
        .await?;

    Ok(Transitive {
        client: StoreClient::with_channel(channel, &config),
    })
}
