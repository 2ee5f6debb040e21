use eaconsole_api_client::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("sync session has stopped")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
