pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, RequestTimeouts};
pub use eaconsole_api;
pub use error::TransportError;
pub use transport::Transport;
