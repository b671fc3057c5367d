//! Command-line interface for sumstore.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use sumstore::DEFAULT_MAX_MESSAGE_SIZE;

/// Command-line arguments for sumstore.
#[derive(Debug, Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Args {
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// What operation to perform.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run the store server, blocking until it is stopped.
    #[clap(alias = "run")]
    Serve(ServeArgs),
    /// Check that a server is reachable.
    Ping(ClientArgs),
    /// Store a value under a key.
    ///
    /// An empty key stores the value under its content-derived key, which is
    /// echoed back.
    #[clap(aliases = ["put", "save"])]
    Set {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The key to store the value under.
        key: String,
        /// The value to store.
        value: String,
    },
    /// Fetch the value stored under a key and write it to stdout.
    #[clap(alias = "fetch")]
    Get {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The key to fetch.
        key: String,
    },
    /// Report whether a key exists and its version.
    Exists {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The key to check.
        key: String,
    },
    /// Count keys with the given prefix.
    Count {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The prefix to count; empty matches every key.
        #[clap(default_value = "")]
        prefix: String,
    },
    /// Delete a key.
    #[clap(aliases = ["remove", "rm"])]
    Delete {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The key to delete.
        key: String,
    },
    /// List one page of keys with the given prefix.
    List {
        #[command(flatten)]
        #[allow(clippy::missing_docs_in_private_items)]
        client: ClientArgs,
        /// The prefix to match; empty matches every key.
        #[clap(default_value = "")]
        prefix: String,
        /// The 1-based page to fetch.
        #[clap(long, default_value_t = 1)]
        page: i32,
    },
    /// Issue an administrative command.
    Admin(AdminArgs),
}

/// Run the store server.
#[derive(Debug, Parser)]
pub(crate) struct ServeArgs {
    /// The database file to serve.
    #[clap(long, default_value = "sumstore.db")]
    pub(crate) store: PathBuf,
    /// The address to listen on.
    #[clap(default_value = "[::1]:50051")]
    pub(crate) addr: SocketAddr,
    /// The shared admin secret gating the Admin rpc.
    #[clap(long, default_value = "")]
    pub(crate) admin_secret: String,
    /// Maximum send/receive message size in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub(crate) max_message_size: usize,
}

/// How to reach a running server.
#[derive(Debug, Parser)]
pub(crate) struct ClientArgs {
    /// The server endpoint.
    #[clap(long, default_value = "http://[::1]:50051")]
    pub(crate) endpoint: String,
    /// Maximum send/receive message size in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub(crate) max_message_size: usize,
    /// The shared admin secret (admin commands only).
    #[clap(long, default_value = "")]
    pub(crate) admin_secret: String,
}

/// Arguments for administrative commands.
#[derive(Debug, Parser)]
pub(crate) struct AdminArgs {
    #[command(flatten)]
    #[allow(clippy::missing_docs_in_private_items)]
    pub(crate) client: ClientArgs,
    /// The command to issue.
    #[command(subcommand)]
    pub(crate) command: AdminCli,
}

/// The administrative command set.
#[derive(Debug, Subcommand)]
pub(crate) enum AdminCli {
    /// Report store statistics.
    Status,
    /// Flush pending writes to durable storage.
    Sync,
    /// Reclaim unused space.
    Gc,
    /// Write a backup file on the server.
    Backup {
        /// Server-side path to write the backup to.
        path: String,
        /// Lowest version to include; 0 requests a full backup.
        #[clap(long, default_value_t = 0)]
        since: u64,
    },
    /// Restore from a backup file on the server.
    Restore {
        /// Server-side path of the backup to load.
        path: String,
    },
    /// Gracefully stop the server.
    Stop,
}
