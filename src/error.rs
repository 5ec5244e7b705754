//! Error types shared by every tier.
//!
//! Inter-tier failures are values, not panics: callers turn a `ClientError` into
//! "treat the peer as down" and carry on.

use thiserror::Error;

/// Failure of a single request/reply exchange with a peer server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The peer refused or could not be reached.
    #[error("cannot reach {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection broke while sending or receiving.
    #[error("I/O error talking to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection without sending a reply.
    #[error("empty reply from {target}")]
    EmptyReply { target: String },
}

/// Failure of the backing key/value store of a storage shard.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The store could not be used even after being recreated.
    #[error("store unrecoverable after recreate: {0}")]
    Unrecoverable(String),
}

/// Failure to parse the static cluster configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing section header '{0}'")]
    MissingSection(&'static str),

    #[error("invalid address entry '{0}' (expected host:port)")]
    InvalidEntry(String),
}
