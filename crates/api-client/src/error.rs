use std::time::Duration;

use thiserror::Error;

/// A failed exchange with the console server.
///
/// Every variant except [`TransportError::Rejected`] means the server could
/// not be reached or answered garbage; the sync engine treats those as a
/// connectivity loss.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("{path} timed out after {}ms", timeout.as_millis())]
    Timeout { path: String, timeout: Duration },

    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("request to {path} failed")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The server answered but refused the mutation.
    #[error("{path} rejected: {message}")]
    Rejected { path: String, message: String },
}

impl TransportError {
    pub fn path(&self) -> &str {
        match self {
            Self::Timeout { path, .. }
            | Self::Status { path, .. }
            | Self::Network { path, .. }
            | Self::Decode { path, .. }
            | Self::Rejected { path, .. } => path,
        }
    }

    /// True when the failure says nothing about connectivity.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
