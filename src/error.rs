//! Error types for meshcache

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving or filling a cache group.
///
/// The enum is `Clone`: a single deduplicated load fans its result out to
/// every caller waiting on the same key, errors included.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Empty key passed to `Group::get`
    #[error("key is required")]
    MissingKey,

    /// The data source failed to produce a value
    #[error("{cause}")]
    Source {
        key: String,
        cause: Arc<anyhow::Error>,
    },

    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// Group built without a data source
    #[error("group {group} has no getter")]
    MissingGetter { group: String },

    /// Peer picker registered twice on the same group
    #[error("peers already registered for group {group}")]
    PeersAlreadyRegistered { group: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Peer Transport Errors
    // =========================================================================
    /// Request to a peer could not be completed
    #[error("request to peer {peer} failed: {reason}")]
    PeerRequest { peer: String, reason: String },

    /// Peer answered with a non-success status
    #[error("peer {peer} returned: {status}")]
    PeerStatus { peer: String, status: u16 },

    /// Peer response body could not be read
    #[error("reading response body from {peer}: {reason}")]
    PeerBody { peer: String, reason: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a data source failure for `key`.
    pub fn data_source(key: impl Into<String>, cause: anyhow::Error) -> Self {
        Error::Source {
            key: key.into(),
            cause: Arc::new(cause),
        }
    }

    /// True for failures raised while talking to a remote peer.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            Error::PeerRequest { .. } | Error::PeerStatus { .. } | Error::PeerBody { .. }
        )
    }

    /// HTTP status the peer server answers with when a lookup fails this way.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingKey => 400,
            Error::Source { .. } => 404,
            Error::PeerRequest { .. } | Error::PeerStatus { .. } | Error::PeerBody { .. } => 502,
            Error::MissingGetter { .. }
            | Error::PeersAlreadyRegistered { .. }
            | Error::Config(_)
            | Error::Internal(_) => 500,
        }
    }
}
