//! The sumstore server and client command line.
//!
//! For usage, run `cargo run --features binary -- --help`.

#![allow(clippy::print_stdout)] // results are reported on stdout by design

#[cfg(not(feature = "sqlite"))]
compile_error!("the binary requires the `sqlite` backend");

mod cli;

use crate::cli::{AdminArgs, AdminCli, Args, ClientArgs, Command, ServeArgs};
use clap::Parser as _;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use sumstore::backend::Sqlite;
use sumstore::{ClientConfig, ItemStore, StoreClient, StoreServer};
use tokio::sync::Notify;
use tonic::transport::Server;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args))
}

/// Dispatch the parsed command line.
async fn run(Args { command }: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Serve(args) => serve(args).await,
        Command::Ping(client) => {
            connect(client).await?.ping().await?;
            println!("ok");
            Ok(ExitCode::SUCCESS)
        }
        Command::Set { client, key, value } => {
            let response = connect(client).await?.set(key, value).await?;
            println!(
                "{} ver64={}",
                String::from_utf8_lossy(&response.key),
                response.ver64
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Get { client, key } => {
            let response = connect(client).await?.get(key).await?;
            let mut stdout = std::io::stdout();
            stdout.write_all(&response.data)?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Exists { client, key } => {
            let response = connect(client).await?.exists(key).await?;
            println!("ver64={}", response.ver64);
            Ok(ExitCode::SUCCESS)
        }
        Command::Count { client, prefix } => {
            let count = connect(client).await?.count(prefix).await?;
            println!("{count}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { client, key } => {
            let response = connect(client).await?.delete(key).await?;
            println!("{} bytes removed", response.bytes);
            Ok(ExitCode::SUCCESS)
        }
        Command::List {
            client,
            prefix,
            page,
        } => {
            let keys = connect(client).await?.list(prefix, page).await?;
            for key in keys {
                println!("{key}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Admin(args) => admin(args).await,
    }
}

/// Run the server, blocking until a `stop` command or a fatal error.
async fn serve(
    ServeArgs {
        store,
        addr,
        admin_secret,
        max_message_size,
    }: ServeArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let shutdown = Arc::new(Notify::new());
    let store = ItemStore::<Sqlite>::at_location(store, admin_secret.as_bytes())?
        .with_shutdown(Arc::clone(&shutdown));

    tracing::info!(%addr, "serving");
    Server::builder()
        .add_service(
            StoreServer::new(store)
                .max_decoding_message_size(max_message_size)
                .max_encoding_message_size(max_message_size),
        )
        .serve_with_shutdown(addr, async move { shutdown.notified().await })
        .await?;

    tracing::info!("stopped");
    Ok(ExitCode::SUCCESS)
}

/// Issue an administrative command and report its outcome.
async fn admin(
    AdminArgs { client, command }: AdminArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut client = connect(client).await?;
    match command {
        AdminCli::Status => {
            let status = client.admin_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        AdminCli::Sync => {
            client.admin_sync().await?;
            println!("ok");
        }
        AdminCli::Gc => {
            client.admin_gc().await?;
            println!("ok");
        }
        AdminCli::Backup { path, since } => {
            let outcome = client.admin_backup(path, since).await?;
            println!("{}", outcome.target);
        }
        AdminCli::Restore { path } => {
            let outcome = client.admin_restore(path).await?;
            println!("{}", outcome.target);
        }
        AdminCli::Stop => {
            client.admin_stop().await?;
            println!("ok");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Connect a client from command-line arguments.
async fn connect(args: ClientArgs) -> Result<StoreClient, sumstore::Error> {
    StoreClient::connect(ClientConfig {
        endpoint: args.endpoint,
        max_message_size: args.max_message_size,
        admin_secret: args.admin_secret.into_bytes(),
    })
    .await
}
