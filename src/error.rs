//! The failure taxonomy for store operations.

/// In-band reply codes carried in `Item::errcode`.
///
/// Application failures travel inside the reply item rather than as
/// transport-level statuses, so a client always sees the full reply frame.
pub mod code {
    /// The operation succeeded; the rest of the reply is valid.
    pub const SUCCESS: i32 = 0;
    /// The admin command name was not recognized.
    pub const UNKNOWN_COMMAND: i32 = 400;
    /// The admin secret checksum did not match.
    pub const AUTH_FAILURE: i32 = 403;
    /// The requested key is not present.
    pub const NOT_FOUND: i32 = 404;
    /// A backend or server-internal failure.
    pub const INTERNAL: i32 = 500;
    /// The payload did not match its declared `sum64`.
    pub const CHECKSUM_MISMATCH: i32 = 501;
}

/// A failed store operation.
///
/// Non-zero reply codes map onto the first five variants; everything else is a
/// client-side or transport-side fault. The client never retries silently.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested key is not present in the store.
    #[error("not found: {status}")]
    NotFound {
        /// Status text echoed from the reply.
        status: String,
    },
    /// The payload failed the store's integrity check.
    #[error("checksum mismatch: {status}")]
    ChecksumMismatch {
        /// Status text echoed from the reply.
        status: String,
    },
    /// The admin secret checksum was rejected.
    #[error("admin authentication failed: {status}")]
    AuthFailure {
        /// Status text echoed from the reply.
        status: String,
    },
    /// The admin command name was not recognized by the server.
    #[error("unknown admin command: {status}")]
    UnknownCommand {
        /// Status text echoed from the reply.
        status: String,
    },
    /// Any other non-zero reply code.
    #[error("store error {errcode}: {status}")]
    Unspecified {
        /// The reply code, unchanged.
        errcode: i32,
        /// Status text echoed from the reply.
        status: String,
    },
    /// The connection could not be established or was lost.
    #[error("transport failure")]
    Transport(#[from] tonic::transport::Error),
    /// The rpc itself failed at the transport layer.
    #[error("rpc failure")]
    Rpc(#[from] tonic::Status),
    /// A structured admin payload could not be encoded or decoded.
    #[error("malformed admin payload")]
    Payload(#[from] serde_json::Error),
    /// A reply field did not have the expected shape.
    #[error("malformed reply: {0}")]
    Malformed(String),
    /// An embedded backend failed to open (transitive clients only).
    #[error("backend failure: {0}")]
    Backend(String),
}

impl Error {
    /// Map a non-zero reply code and status onto the taxonomy.
    pub(crate) fn from_reply(errcode: i32, status: &[u8]) -> Self {
        let status = String::from_utf8_lossy(status).into_owned();
        match errcode {
            code::NOT_FOUND => Self::NotFound { status },
            code::CHECKSUM_MISMATCH => Self::ChecksumMismatch { status },
            code::AUTH_FAILURE => Self::AuthFailure { status },
            code::UNKNOWN_COMMAND => Self::UnknownCommand { status },
            errcode => Self::Unspecified { errcode, status },
        }
    }

    /// The in-band reply code, when the failure originated in the store.
    #[must_use]
    pub const fn errcode(&self) -> Option<i32> {
        match self {
            Self::NotFound { .. } => Some(code::NOT_FOUND),
            Self::ChecksumMismatch { .. } => Some(code::CHECKSUM_MISMATCH),
            Self::AuthFailure { .. } => Some(code::AUTH_FAILURE),
            Self::UnknownCommand { .. } => Some(code::UNKNOWN_COMMAND),
            Self::Unspecified { errcode, .. } => Some(*errcode),
            _ => None,
        }
    }
}
