//! Error types for each layer of the sync pipeline

use thiserror::Error;

/// Startup configuration problems. Always fatal, raised before any work.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting `{0}` is not set")]
    Missing(&'static str),

    #[error("invalid value for `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures talking to the remote server. Fatal to the whole run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request for page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered page {page} with HTTP {status}")]
    Status { page: u32, status: u16 },

    #[error("page {page} body is not a session listing: {source}")]
    Body {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("server URL `{url}` is unusable: {reason}")]
    BaseUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("session record is not decodable: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session record has no id")]
    MissingId,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o failure preparing database: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode column `{column}`: {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A single record failed; the controller rolls it back and moves on.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that end a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Process exit status for a failed command: 2 for configuration problems
/// (an unusable server URL included), 3 when the remote server could not be
/// read, 1 for anything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<SourceError>(), Some(SourceError::BaseUrl { .. }))
    {
        return 2;
    }
    if err.downcast_ref::<SourceError>().is_some()
        || matches!(err.downcast_ref::<SyncError>(), Some(SyncError::Source(_)))
    {
        return 3;
    }
    1
}
