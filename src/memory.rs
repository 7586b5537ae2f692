//! In-memory presentation backend
//!
//! Stands in for a real host window: clones share one stage arena, and
//! transitions settle either immediately or after a configurable simulated
//! animation delay. Validation failures surface through the returned
//! completions, the same path real transition failures take.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time;
use tracing::{debug, info};

use crate::backend::{Completion, StageBackend};
use crate::module::ModuleHandle;
use crate::screen::{Ownership, ScreenId};
use crate::stage::{Stage, StageSnapshot};
use crate::{Error, Result};

/// In-memory presentation backend with simulated transitions.
///
/// Cloning is cheap and every clone drives the same stage.
#[derive(Clone)]
pub struct MemoryBackend {
    /// Shared screen arena
    stage: Arc<Mutex<Stage>>,
    /// Simulated duration of animated transitions
    transition_delay: Duration,
}

impl MemoryBackend {
    /// Create a backend whose transitions settle immediately.
    pub fn new() -> Self {
        Self {
            stage: Arc::new(Mutex::new(Stage::new())),
            transition_delay: Duration::ZERO,
        }
    }

    /// Let animated transitions take `delay` of simulated time.
    ///
    /// Unanimated transitions still settle immediately.
    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    /// The root screen of the underlying stage
    pub fn root(&self) -> ScreenId {
        self.stage().root()
    }

    /// Register a new screen. It starts detached.
    pub fn add_screen(&self) -> ScreenId {
        self.stage().add_screen()
    }

    /// Push `child` onto `container`'s stack. Bookkeeping only, no
    /// transition.
    pub fn push(&self, container: ScreenId, child: ScreenId) -> Result<()> {
        self.stage().push(container, child)
    }

    /// Set or clear the skip-on-dismiss flag of `screen`.
    pub fn set_skip_on_dismiss(&self, screen: ScreenId, skip: bool) -> Result<()> {
        self.stage().set_skip_on_dismiss(screen, skip)
    }

    /// Register the explicit module input of `screen`.
    pub fn set_module_input(&self, screen: ScreenId, module: ModuleHandle) -> Result<()> {
        self.stage().set_module_input(screen, module)
    }

    /// Register the module output of `screen`, used as a retrieval fallback.
    pub fn set_output(&self, screen: ScreenId, output: ModuleHandle) -> Result<()> {
        self.stage().set_output(screen, output)
    }

    /// Whether `screen` is reachable from the root
    pub fn is_live(&self, screen: ScreenId) -> bool {
        self.stage().is_live(screen)
    }

    /// The modal child of `screen`, if any
    pub fn presented_of(&self, screen: ScreenId) -> Option<ScreenId> {
        self.stage().presented_of(screen)
    }

    /// The navigation stack of `screen`, bottom first
    pub fn stack_of(&self, screen: ScreenId) -> Vec<ScreenId> {
        self.stage().stack_of(screen).to_vec()
    }

    /// The embedded children of `screen`
    pub fn embedded_of(&self, screen: ScreenId) -> Vec<ScreenId> {
        self.stage().embedded_of(screen).to_vec()
    }

    /// Serializable snapshot of the whole arena
    pub fn snapshot(&self) -> StageSnapshot {
        self.stage().snapshot()
    }

    fn stage(&self) -> MutexGuard<'_, Stage> {
        self.stage.lock().expect("stage lock poisoned")
    }

    /// Run `settle` now for instant transitions, or after the simulated
    /// animation for animated ones.
    fn finish<F>(&self, animated: bool, settle: F) -> Completion
    where
        F: FnOnce(&mut Stage) -> Result<()> + Send + 'static,
    {
        if !animated || self.transition_delay.is_zero() {
            let mut stage = self.stage();
            return Completion::ready(settle(&mut stage));
        }
        let (sender, completion) = Completion::pending();
        let backend = self.clone();
        tokio::spawn(async move {
            time::sleep(backend.transition_delay).await;
            let mut stage = backend.stage();
            sender.resolve(settle(&mut stage));
        });
        completion
    }

    fn animates(&self, animated: bool) -> bool {
        animated && !self.transition_delay.is_zero()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StageBackend for MemoryBackend {
    fn present(&self, presenter: ScreenId, child: ScreenId, animated: bool) -> Completion {
        let mut stage = self.stage();
        if stage.in_transition(presenter) {
            return Completion::ready(Err(Error::AlreadyInProgress(presenter)));
        }
        if stage.in_transition(child) {
            return Completion::ready(Err(Error::AlreadyInProgress(child)));
        }
        // topology changes at transition start, the completion only settles it
        if let Err(err) = stage.attach_presented(presenter, child) {
            return Completion::ready(Err(err));
        }
        info!(
            "Presenting {} above {} (animated: {})",
            child, presenter, animated
        );
        if self.animates(animated) {
            stage.mark_subtree(child, true);
        }
        drop(stage);
        self.finish(animated, move |stage| {
            stage.mark_subtree(child, false);
            debug!("Present transition for {} settled", child);
            Ok(())
        })
    }

    fn dismiss(&self, screen: ScreenId, animated: bool) -> Completion {
        let mut stage = self.stage();
        match stage.ownership(screen) {
            Ok(Ownership::Presented { .. }) => {}
            Ok(_) => return Completion::ready(Err(Error::NotPresented(screen))),
            Err(err) => return Completion::ready(Err(err)),
        }
        if let Some(busy) = stage.subtree_in_transition(screen) {
            return Completion::ready(Err(Error::AlreadyInProgress(busy)));
        }
        info!("Dismissing {} (animated: {})", screen, animated);
        if self.animates(animated) {
            stage.mark_subtree(screen, true);
        }
        drop(stage);
        self.finish(animated, move |stage| {
            stage.detach_subtree(screen)?;
            debug!("Dismiss transition for {} settled", screen);
            Ok(())
        })
    }

    fn pop_stack(&self, container: ScreenId, to_index: usize, animated: bool) -> Completion {
        let mut stage = self.stage();
        if let Err(err) = stage.ownership(container) {
            return Completion::ready(Err(err));
        }
        let stack = stage.stack_of(container).to_vec();
        if to_index >= stack.len() {
            return Completion::ready(Err(Error::StackIndexOutOfRange {
                container,
                index: to_index,
            }));
        }
        let doomed: Vec<ScreenId> = stack[to_index + 1..].to_vec();
        if doomed.is_empty() {
            return Completion::ready(Ok(()));
        }
        if let Some(busy) = stage.subtree_in_transition(container) {
            return Completion::ready(Err(Error::AlreadyInProgress(busy)));
        }
        info!(
            "Popping {} down to index {} ({} entries, animated: {})",
            container,
            to_index,
            doomed.len(),
            animated
        );
        if self.animates(animated) {
            for &entry in &doomed {
                stage.mark_subtree(entry, true);
            }
        }
        drop(stage);
        self.finish(animated, move |stage| {
            stage.pop_to(container, to_index)?;
            debug!("Pop transition for {} settled", container);
            Ok(())
        })
    }

    fn attach_child(&self, parent: ScreenId, child: ScreenId) -> Result<()> {
        self.stage().attach_embedded(parent, child)
    }

    fn detach_child(&self, child: ScreenId) -> Result<()> {
        self.stage().detach_embedded(child)
    }

    fn ownership(&self, screen: ScreenId) -> Result<Ownership> {
        self.stage().ownership(screen)
    }

    fn skip_on_dismiss(&self, screen: ScreenId) -> bool {
        self.stage().skip_on_dismiss(screen)
    }

    fn in_transition(&self, screen: ScreenId) -> bool {
        self.stage().in_transition(screen)
    }

    fn module_input(&self, screen: ScreenId) -> Option<ModuleHandle> {
        self.stage().module_input(screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_present_settles_immediately_without_delay() {
        let backend = MemoryBackend::new();
        let screen = backend.add_screen();
        backend
            .present(backend.root(), screen, true)
            .finished()
            .await
            .expect("Failed to present");

        assert!(backend.is_live(screen));
        assert!(!backend.in_transition(screen));
        assert_eq!(backend.presented_of(backend.root()), Some(screen));
    }

    #[tokio::test]
    async fn test_validation_failure_reported_through_completion() {
        let backend = MemoryBackend::new();
        let first = backend.add_screen();
        let second = backend.add_screen();
        backend
            .present(backend.root(), first, false)
            .finished()
            .await
            .expect("Failed to present");

        let result = backend.present(backend.root(), second, false).finished().await;
        assert!(matches!(result, Err(Error::AlreadyPresenting(_))));
    }

    #[tokio::test]
    async fn test_dismiss_requires_modal_edge() {
        let backend = MemoryBackend::new();
        let container = backend.add_screen();
        let entry = backend.add_screen();
        backend.push(container, entry).expect("Failed to push");
        backend
            .present(backend.root(), container, false)
            .finished()
            .await
            .expect("Failed to present");

        let result = backend.dismiss(entry, false).finished().await;
        assert!(matches!(result, Err(Error::NotPresented(id)) if id == entry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_animated_dismiss_marks_subtree_until_settled() {
        let backend = MemoryBackend::new().with_transition_delay(Duration::from_millis(50));
        let outer = backend.add_screen();
        let inner = backend.add_screen();
        backend
            .present(backend.root(), outer, false)
            .finished()
            .await
            .expect("Failed to present outer");
        backend
            .present(outer, inner, false)
            .finished()
            .await
            .expect("Failed to present inner");

        let completion = backend.dismiss(outer, true);
        assert!(backend.in_transition(outer));
        assert!(backend.in_transition(inner));
        assert!(backend.is_live(outer));

        completion.finished().await.expect("Failed to dismiss");
        assert!(!backend.in_transition(outer));
        assert!(!backend.in_transition(inner));
        assert!(!backend.is_live(outer));
        assert_eq!(backend.presented_of(backend.root()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_dismissals_rejected() {
        let backend = MemoryBackend::new().with_transition_delay(Duration::from_millis(50));
        let screen = backend.add_screen();
        backend
            .present(backend.root(), screen, false)
            .finished()
            .await
            .expect("Failed to present");

        let first = backend.dismiss(screen, true);
        let second = backend.dismiss(screen, true).finished().await;
        assert!(matches!(second, Err(Error::AlreadyInProgress(_))));

        first.finished().await.expect("Failed to dismiss");
        assert!(!backend.is_live(screen));
    }

    #[tokio::test]
    async fn test_pop_to_current_top_is_a_noop() {
        let backend = MemoryBackend::new();
        let container = backend.add_screen();
        let entry = backend.add_screen();
        backend.push(container, entry).expect("Failed to push");
        backend
            .present(backend.root(), container, false)
            .finished()
            .await
            .expect("Failed to present");

        backend
            .pop_stack(container, 0, true)
            .finished()
            .await
            .expect("Failed to pop");
        assert_eq!(backend.stack_of(container), vec![entry]);
    }

    #[tokio::test]
    async fn test_detach_child_cuts_only_the_embed_edge() {
        let backend = MemoryBackend::new();
        let host = backend.add_screen();
        let panel = backend.add_screen();
        let entry = backend.add_screen();
        backend
            .present(backend.root(), host, false)
            .finished()
            .await
            .expect("Failed to present");
        backend.attach_child(host, panel).expect("Failed to embed");
        backend.push(panel, entry).expect("Failed to push");
        assert!(backend.is_live(entry));

        backend.detach_child(panel).expect("Failed to detach");

        assert!(backend.embedded_of(host).is_empty());
        assert_eq!(
            backend.ownership(panel).expect("Failed to query panel"),
            Ownership::Detached
        );
        // the panel leaves the host but keeps its own stack
        assert_eq!(backend.stack_of(panel), vec![entry]);
        assert!(!backend.is_live(panel));
    }
}
