pub mod error;
pub mod scheduler;
pub mod session;

pub use error::SessionError;
pub use scheduler::PollScheduler;
pub use session::{SessionCommand, SessionHandle, Submitted, SyncSession, spawn_session};
