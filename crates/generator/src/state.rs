//! Generator lifecycle states.

use std::fmt;

/// Lifecycle phase of a block generator.
///
/// Phases advance monotonically in the order listed; there is no restart.
/// Shutdown is staged so that upstream intake ceases before block formation,
/// which ceases before block dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorState {
    /// Constructed, workers not yet launched.
    Initialized,
    /// Accepting items, generating blocks, pushing blocks.
    Active,
    /// No longer accepting items; blocks are still generated and pushed.
    StoppedAddingData,
    /// No longer generating blocks; queued blocks are still pushed.
    StoppedGeneratingBlocks,
    /// Fully stopped.
    StoppedAll,
}

impl GeneratorState {
    /// True while `add*` calls are admitted.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// True once shutdown has fully completed.
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::StoppedAll)
    }

    /// True while rolls may still seal new blocks, which keeps the drain
    /// worker polling instead of draining the remainder.
    pub const fn is_generating_blocks(&self) -> bool {
        !matches!(self, Self::StoppedGeneratingBlocks | Self::StoppedAll)
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::StoppedAddingData => "stopped-adding-data",
            Self::StoppedGeneratingBlocks => "stopped-generating-blocks",
            Self::StoppedAll => "stopped",
        };
        f.write_str(name)
    }
}
