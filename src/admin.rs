//! Administrative commands multiplexed through the `Admin` rpc.
//!
//! On the wire an admin request is an ordinary item: the command name in the
//! key field, the checksum of the shared secret in `sum64`, and a
//! command-specific JSON argument in `data`. This module gives that convention
//! an explicit command type so both ends dispatch on an enum rather than on
//! raw strings.

use serde::{Deserialize, Serialize};

/// A privileged command issued through the `Admin` rpc.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AdminCommand {
    /// Report store statistics as a [`StoreStatus`] payload.
    Status,
    /// Flush pending writes to durable storage. No reply payload.
    Sync,
    /// Reclaim unused space. No reply payload.
    Gc,
    /// Write a backup of the store to a file on the server.
    Backup {
        /// Server-side path to write the backup to.
        path: String,
        /// Lowest version to include; `0` requests a full backup.
        since: u64,
    },
    /// Replace the store contents from a backup file on the server.
    Restore {
        /// Server-side path of the backup to load.
        path: String,
    },
    /// Gracefully stop the server. No reply payload.
    Stop,
}

impl AdminCommand {
    /// The wire name of the command, as carried in the item key field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Sync => "sync",
            Self::Gc => "gc",
            Self::Backup { .. } => "backup",
            Self::Restore { .. } => "restore",
            Self::Stop => "stop",
        }
    }

    /// The JSON argument payload. Empty for commands without arguments.
    pub(crate) fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Backup { path, since } => serde_json::to_vec(&BackupArgs {
                path: path.clone(),
                since: since.to_string(),
            }),
            Self::Restore { path } => serde_json::to_vec(&RestoreArgs { path: path.clone() }),
            _ => Ok(Vec::new()),
        }
    }

    /// Decode a command from the key and data fields of an admin request.
    ///
    /// Command names are matched case-insensitively, as existing clients send
    /// both spellings.
    pub(crate) fn parse(key: &[u8], data: &[u8]) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(key).to_lowercase();
        match name.as_str() {
            "status" => Ok(Self::Status),
            "sync" => Ok(Self::Sync),
            "gc" => Ok(Self::Gc),
            "stop" => Ok(Self::Stop),
            "backup" => {
                let args: BackupArgs =
                    serde_json::from_slice(data).map_err(|err| ParseError::Args(err.to_string()))?;
                if args.path.is_empty() {
                    return Err(ParseError::Args("path is required".to_owned()));
                }
                let since = args
                    .since
                    .parse()
                    .map_err(|_| ParseError::Args("since must be a decimal integer".to_owned()))?;
                Ok(Self::Backup {
                    path: args.path,
                    since,
                })
            }
            "restore" => {
                let args: RestoreArgs =
                    serde_json::from_slice(data).map_err(|err| ParseError::Args(err.to_string()))?;
                if args.path.is_empty() {
                    return Err(ParseError::Args("path is required".to_owned()));
                }
                Ok(Self::Restore { path: args.path })
            }
            _ => Err(ParseError::Unknown(name)),
        }
    }
}

/// Why an admin request could not be decoded into a command.
#[derive(Debug)]
pub(crate) enum ParseError {
    /// The command name is not in the registry.
    Unknown(String),
    /// The command is known but its argument payload is unusable.
    Args(String),
}

/// Arguments for `backup`, as they appear on the wire.
///
/// `since` is a decimal string for parity with existing clients.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BackupArgs {
    /// Server-side path to write the backup to.
    pub(crate) path: String,
    /// Lowest version to include, as a decimal string.
    #[serde(default = "zero")]
    pub(crate) since: String,
}

/// Arguments for `restore`, as they appear on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RestoreArgs {
    /// Server-side path of the backup to load.
    pub(crate) path: String,
}

/// Serde default for a decimal-string zero.
fn zero() -> String {
    "0".to_owned()
}

/// Statistics reported by the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Number of live keys.
    pub key_count: u64,
    /// Highest version assigned so far.
    pub max_version: u64,
    /// Approximate size of the store in bytes.
    pub db_size: u64,
    /// Milliseconds spent gathering these statistics.
    pub elapse_ms: u64,
}

/// Outcome of a `backup` or `restore` command, echoed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    /// The path supplied in the request.
    pub path: String,
    /// The version the operation started from, as a decimal string.
    pub since: String,
    /// The file written, or a short result marker for restores.
    pub target: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_round_trip() {
        for command in [
            AdminCommand::Status,
            AdminCommand::Sync,
            AdminCommand::Gc,
            AdminCommand::Stop,
        ] {
            let parsed = AdminCommand::parse(command.name().as_bytes(), b"").unwrap();
            assert_eq!(parsed, command);
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(
            AdminCommand::parse(b"STATUS", b"").unwrap(),
            AdminCommand::Status
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            AdminCommand::parse(b"drop-everything", b""),
            Err(ParseError::Unknown(name)) if name == "drop-everything"
        ));
    }

    #[test]
    fn backup_args_round_trip() {
        let command = AdminCommand::Backup {
            path: "/backups/store.bak".to_owned(),
            since: 42,
        };
        let payload = command.payload().unwrap();
        assert_eq!(AdminCommand::parse(b"backup", &payload).unwrap(), command);
    }

    #[test]
    fn backup_since_defaults_to_zero() {
        let parsed = AdminCommand::parse(b"backup", br#"{"path":"/tmp/x"}"#).unwrap();
        assert_eq!(
            parsed,
            AdminCommand::Backup {
                path: "/tmp/x".to_owned(),
                since: 0
            }
        );
    }

    #[test]
    fn backup_requires_a_path() {
        assert!(matches!(
            AdminCommand::parse(b"backup", br#"{"path":""}"#),
            Err(ParseError::Args(_))
        ));
        assert!(matches!(
            AdminCommand::parse(b"backup", b"not json"),
            Err(ParseError::Args(_))
        ));
    }
}
