// Error types shared by the library modules. The command surface turns these
// into printed messages and exit codes (see `cli.rs`).

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credentials from {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write credentials to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no host configured: pass --host, set HOST, or add HOST to {}", .0.display())]
    MissingHost(PathBuf),
    #[error("invalid host URL '{input}': {reason}")]
    InvalidHost { input: String, reason: String },
}

/// Failures of the API client that prevent an outcome from being produced.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout and friends.
    #[error("could not reach {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("cannot build endpoint '{0}' from the configured host")]
    Endpoint(String),
    #[error(transparent)]
    Credentials(#[from] StoreError),
}

/// Repository configuration that cannot be turned into a payload yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("a remote repository needs a non-empty URL")]
    MissingRemoteUrl,
    #[error("a virtual repository needs a package type")]
    MissingPackageType,
}

/// Text that does not name a known package type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown package type '{0}'")]
pub struct UnknownPackageType(pub String);
