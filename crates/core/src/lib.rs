pub mod alerts;
pub mod case_counts;
pub mod controls;
pub mod model;
pub mod open_set;
pub mod reconcile;
pub mod snapshot;
pub mod state;
pub mod validate;
pub mod view;

pub use model::*;
pub use state::{BootstrapOutcome, ConsoleState, DetailOutcome, DetailRequest, PollOutcome};
pub use validate::BootstrapError;
pub use view::{ConsoleView, TabView};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
