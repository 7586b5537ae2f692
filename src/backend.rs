//! Presentation backend interface
//!
//! The dismissal machinery talks to the host window through a narrow
//! capability set: three transition primitives, two containment edges, and a
//! handful of topology queries. Transitions report back through
//! [`Completion`] notifications so callers can await the moment the stage
//! actually settles.

use tokio::sync::oneshot;

use crate::module::ModuleHandle;
use crate::screen::{Ownership, ScreenId};
use crate::{Error, Result};

/// Completion notification for one stage transition.
///
/// Every transition primitive hands one of these back, resolved or not.
/// Await [`finished`](Completion::finished) to learn how the transition
/// ended; validation failures arrive the same way as animation results.
pub struct Completion {
    rx: oneshot::Receiver<Result<()>>,
}

impl Completion {
    /// A notification pair: the sender half resolves the returned completion.
    pub fn pending() -> (CompletionSender, Completion) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender { tx }, Completion { rx })
    }

    /// An already-resolved completion, for transitions that settle
    /// synchronously.
    pub fn ready(result: Result<()>) -> Completion {
        let (sender, completion) = Completion::pending();
        sender.resolve(result);
        completion
    }

    /// Wait for the transition to finish.
    ///
    /// Reports [`Error::BackendGone`] if the backend dropped its sender half
    /// without resolving.
    pub async fn finished(self) -> Result<()> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::BackendGone),
        }
    }
}

/// Resolving half of a [`Completion`].
pub struct CompletionSender {
    tx: oneshot::Sender<Result<()>>,
}

impl CompletionSender {
    /// Resolve the paired completion with the transition result.
    pub fn resolve(self, result: Result<()>) {
        // the caller may have dropped the completion without awaiting it
        let _ = self.tx.send(result);
    }
}

/// Capability set the dismissal resolver needs from a host window.
///
/// Implementations are shared across tasks, so every method takes `&self`.
pub trait StageBackend: Send + Sync {
    /// Present `child` modally above `presenter`.
    fn present(&self, presenter: ScreenId, child: ScreenId, animated: bool) -> Completion;

    /// Dismiss the modally presented `screen` together with everything it
    /// owns.
    fn dismiss(&self, screen: ScreenId, animated: bool) -> Completion;

    /// Pop `container`'s stack so that `to_index` becomes its top entry.
    fn pop_stack(&self, container: ScreenId, to_index: usize, animated: bool) -> Completion;

    /// Embed `child` inside `parent`. Instant, no transition.
    fn attach_child(&self, parent: ScreenId, child: ScreenId) -> Result<()>;

    /// Cut the embed edge above `child`. Instant, no transition.
    fn detach_child(&self, child: ScreenId) -> Result<()>;

    /// Current ownership edge of `screen`.
    fn ownership(&self, screen: ScreenId) -> Result<Ownership>;

    /// Whether `screen` asks to be skipped when a descendant dismisses
    /// through it
    fn skip_on_dismiss(&self, screen: ScreenId) -> bool;

    /// Whether `screen` is currently covered by a running transition
    fn in_transition(&self, screen: ScreenId) -> bool;

    /// The module handle registered for `screen`, if any
    fn module_input(&self, screen: ScreenId) -> Option<ModuleHandle>;
}
