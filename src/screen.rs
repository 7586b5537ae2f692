//! Screen identity and ownership types
//!
//! Every screen known to a [`Stage`](crate::stage::Stage) is addressed by a
//! [`ScreenId`] and connected to the rest of the chain by an [`Ownership`]
//! edge pointing at its owner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a screen within a stage arena.
///
/// Ids are allocated by [`Stage::add_screen`](crate::stage::Stage::add_screen)
/// and stay valid for the lifetime of the stage, even after the screen has
/// left the presentation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScreenId(pub(crate) u64);

impl ScreenId {
    /// Raw numeric value, mainly useful in logs and snapshots
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen#{}", self.0)
    }
}

/// How a screen is currently connected to the presentation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ownership {
    /// The stage root; owned by nobody and never dismissible
    Root,
    /// Known to the stage but not wired into the chain
    Detached,
    /// Modally presented by another screen
    Presented {
        /// The screen that presented this one
        presenter: ScreenId,
    },
    /// Entry of a navigation container's stack
    Stacked {
        /// The owning navigation container
        container: ScreenId,
        /// Position in the stack, zero being the bottom entry
        index: usize,
    },
    /// Embedded child living inside a parent screen's own area
    Embedded {
        /// The screen hosting this child
        parent: ScreenId,
    },
}

impl Ownership {
    /// The owning screen, if any
    pub fn owner(&self) -> Option<ScreenId> {
        match self {
            Ownership::Root | Ownership::Detached => None,
            Ownership::Presented { presenter } => Some(*presenter),
            Ownership::Stacked { container, .. } => Some(*container),
            Ownership::Embedded { parent } => Some(*parent),
        }
    }

    /// True when the screen is wired into the chain (the root included)
    pub fn is_attached(&self) -> bool {
        !matches!(self, Ownership::Detached)
    }
}
