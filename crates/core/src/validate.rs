use crate::model::DomainBootstrap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("invalid api version: {apiver}, expected a positive integer")]
    InvalidApiVersion { apiver: i64 },
}

/// Reject domain payloads from a malformed server.
pub fn validate_bootstrap(domain: &DomainBootstrap) -> Result<(), BootstrapError> {
    match domain.apiver {
        Some(apiver) if apiver <= 0 => Err(BootstrapError::InvalidApiVersion { apiver }),
        _ => Ok(()),
    }
}
