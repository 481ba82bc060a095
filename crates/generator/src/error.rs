//! Block generator error types.

use thiserror::Error;

use crate::GeneratorState;

/// Error produced by a listener callback.
///
/// Listener implementations live outside this crate, so their failures are
/// carried as boxed errors.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Block generator errors.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Operation attempted in a lifecycle state that does not permit it.
    #[error("Cannot {operation} while the generator is {state}")]
    WrongState {
        /// The rejected operation.
        operation: &'static str,
        /// The state observed at the time of the call.
        state: GeneratorState,
    },

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A listener callback failed inside the admission critical section.
    #[error("Listener callback failed: {0}")]
    Listener(#[source] ListenerError),

    /// The block queue was closed underneath a worker.
    #[error("Block queue closed")]
    QueueClosed,
}

impl GeneratorError {
    /// True for state-precondition failures, which callers commonly treat as
    /// a signal to stop producing rather than as a fault.
    pub const fn is_wrong_state(&self) -> bool {
        matches!(self, Self::WrongState { .. })
    }
}
