//! Module association types
//!
//! Screens are dumb stage objects; the logic behind each one lives in a
//! module. A module registers a [`ModuleInput`] on its screen so the
//! dismissal machinery can tell it about lifecycle events it would otherwise
//! miss, such as being collapsed together with an ancestor.

use std::sync::Arc;

/// Receiver for lifecycle notifications aimed at the module behind a screen.
pub trait ModuleInput: Send + Sync {
    /// Called after the module's screen was torn down as part of an ancestor's
    /// transition instead of getting a dismissal of its own.
    ///
    /// The default implementation ignores the event.
    fn did_skip_on_dismiss(&self) {}
}

/// Shared handle to a module input.
pub type ModuleHandle = Arc<dyn ModuleInput>;
