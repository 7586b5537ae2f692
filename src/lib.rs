//! Offstage - coordinated dismissal for screen hierarchies
//!
//! This library resolves which screens must leave the stage when a module asks
//! to close, honoring skip-on-dismiss flags across modal chains, navigation
//! stacks, and embedded child screens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod memory;
pub mod module;
pub mod navigator;
pub mod screen;
pub mod stage;

#[cfg(test)]
mod tests;

use crate::screen::ScreenId;

/// Result type alias for Offstage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Offstage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The screen id is not registered in the stage
    #[error("Unknown screen {0}")]
    UnknownScreen(ScreenId),

    /// The screen is already covered by a running transition
    #[error("Screen {0} is already part of a transition in progress")]
    AlreadyInProgress(ScreenId),

    /// The screen is already attached somewhere in the chain
    #[error("Screen {0} is already owned by another screen")]
    AlreadyOwned(ScreenId),

    /// The presenter already has a modal child
    #[error("Screen {0} is already presenting another screen")]
    AlreadyPresenting(ScreenId),

    /// The screen has no owner to detach it from
    #[error("Screen {0} is not attached to the presentation chain")]
    NotAttached(ScreenId),

    /// The screen has no modal presentation edge
    #[error("Screen {0} has no modal presentation to dismiss")]
    NotPresented(ScreenId),

    /// Attaching the screen would make it an ancestor of itself
    #[error("Attaching screen {0} would create an ownership cycle")]
    WouldCycle(ScreenId),

    /// A stack pop was requested past the end of the stack
    #[error("Stack index {index} out of range for container {container}")]
    StackIndexOutOfRange {
        /// The navigation container whose stack was popped
        container: ScreenId,
        /// The offending target index
        index: usize,
    },

    /// Transition-level failure reported by the presentation backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend dropped a transition without reporting a result
    #[error("Backend dropped the transition before completing it")]
    BackendGone,
}

/// Initialize the Offstage library with logging
pub fn init() {
    tracing_subscriber::fmt::init();
}
