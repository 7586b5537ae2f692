//! Dismissal resolution and execution
//!
//! This module implements the close path for screen modules:
//! - Pass-through walk from the requester to the screen that actually closes
//! - Skip-on-dismiss elevation past ancestors that opt out of surviving
//! - Choice between popping a navigation stack and dismissing a modal chain
//! - Exactly-once completion per request, failures included

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::StageBackend;
use crate::screen::{Ownership, ScreenId};
use crate::{Error, Result};

/// Lifecycle of a single dismissal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Accepted, nothing resolved yet
    Requested,
    /// Walking the chain to find the teardown anchor
    Resolving,
    /// Waiting for the backend transition to settle
    Executing,
    /// Finished, successfully or not
    Completed,
}

/// Bookkeeping record for one [`close_module`](Navigator::close_module)
/// call.
#[derive(Debug, Clone)]
pub struct DismissalRequest {
    /// Request id, unique per call
    pub id: Uuid,
    /// The screen that asked to close its module
    pub requester: ScreenId,
    /// Whether the teardown is animated
    pub animated: bool,
    /// Current lifecycle state
    pub state: RequestState,
}

/// The single backend primitive a resolved request executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// The walk ended at the root or a detached screen; nothing to do
    None,
    /// Dismiss this modally presented anchor with its whole subtree
    Dismiss(ScreenId),
    /// Pop the container's stack so `to` becomes the top entry
    Pop { container: ScreenId, to: usize },
}

/// Outcome of the resolution walk: the primitive to run plus every screen
/// elevated past on the way, requester first.
struct Resolution {
    teardown: Teardown,
    skipped: Vec<ScreenId>,
}

/// Clears a request table entry when the owning call ends.
///
/// [`close_module`](Navigator::close_module) holds one of these across its
/// awaits, so the entry leaves the table even when the caller drops the
/// future mid-transition.
struct RequestGuard {
    requests: Arc<Mutex<HashMap<Uuid, DismissalRequest>>>,
    id: Uuid,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        // drop handlers must not panic; a poisoned table is left as-is
        if let Ok(mut requests) = self.requests.lock() {
            requests.remove(&self.id);
        }
    }
}

/// Resolves and executes module close requests against a presentation
/// backend.
///
/// Cloning is cheap; clones share the backend and the in-flight request
/// table.
#[derive(Clone)]
pub struct Navigator {
    /// The host window capability set
    backend: Arc<dyn StageBackend>,
    /// Requests currently being resolved or executed
    requests: Arc<Mutex<HashMap<Uuid, DismissalRequest>>>,
}

impl Navigator {
    /// Create a navigator driving the given backend.
    pub fn new<B>(backend: B) -> Self
    where
        B: StageBackend + 'static,
    {
        Self {
            backend: Arc::new(backend),
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Close the module behind `requester`, tearing down every screen the
    /// chain says must go with it.
    ///
    /// The requester's ownership chain decides what actually happens: an
    /// embedded requester closes through its embedding parent, a stack entry
    /// pops its stack, a modally presented screen is dismissed, and
    /// skip-on-dismiss ancestors are collapsed together with the requester.
    /// Exactly one backend primitive runs per call. When the walk ends at
    /// the root or a detached screen the call succeeds without touching
    /// anything.
    ///
    /// Modules elevated past during the walk are told through
    /// [`ModuleInput::did_skip_on_dismiss`](crate::module::ModuleInput::did_skip_on_dismiss)
    /// once the teardown has settled, requester first.
    ///
    /// Dropping the returned future abandons the wait, not the teardown: a
    /// primitive already issued settles on its own and the request still
    /// leaves the in-flight table.
    ///
    /// # Arguments
    ///
    /// * `requester` - The screen whose module wants to close
    /// * `animated` - Whether the backend should animate the teardown
    ///
    /// # Returns
    ///
    /// Resolves once the stage has settled, or with the first error the
    /// resolution or the backend reported. Each call resolves exactly once.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use offstage::backend::StageBackend;
    /// use offstage::memory::MemoryBackend;
    /// use offstage::navigator::Navigator;
    ///
    /// # async fn demo() -> offstage::Result<()> {
    /// let backend = MemoryBackend::new();
    /// let screen = backend.add_screen();
    /// backend.present(backend.root(), screen, false).finished().await?;
    ///
    /// let navigator = Navigator::new(backend.clone());
    /// navigator.close_module(screen, true).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn close_module(&self, requester: ScreenId, animated: bool) -> Result<()> {
        let request = DismissalRequest {
            id: Uuid::new_v4(),
            requester,
            animated,
            state: RequestState::Requested,
        };
        let id = request.id;
        debug!("Dismissal request {} opened by {}", id, requester);
        self.lock_requests().insert(id, request);
        let _guard = RequestGuard {
            requests: Arc::clone(&self.requests),
            id,
        };

        let result = self.run(id, requester, animated).await;
        match &result {
            Ok(()) => info!("Dismissal request {} completed", id),
            Err(err) => warn!("Dismissal request {} failed: {}", id, err),
        }
        result
    }

    /// Number of requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock_requests().len()
    }

    /// Snapshot of the in-flight request table
    pub fn requests(&self) -> Vec<DismissalRequest> {
        self.lock_requests().values().cloned().collect()
    }

    async fn run(&self, id: Uuid, requester: ScreenId, animated: bool) -> Result<()> {
        self.set_state(id, RequestState::Resolving);
        let resolution = self.resolve(requester)?;
        match resolution.teardown {
            Teardown::None => {
                debug!(
                    "{} has nothing above the root to tear down; close is a no-op",
                    requester
                );
                self.set_state(id, RequestState::Completed);
                return Ok(());
            }
            Teardown::Dismiss(anchor) => {
                self.set_state(id, RequestState::Executing);
                debug!("Request {} dismisses anchor {}", id, anchor);
                self.backend.dismiss(anchor, animated).finished().await?;
            }
            Teardown::Pop { container, to } => {
                self.set_state(id, RequestState::Executing);
                debug!("Request {} pops {} down to index {}", id, container, to);
                self.backend
                    .pop_stack(container, to, animated)
                    .finished()
                    .await?;
            }
        }
        self.set_state(id, RequestState::Completed);
        self.notify_skipped(&resolution.skipped);
        Ok(())
    }

    /// Walk the ownership chain from `requester` to the screen whose
    /// transition tears the right subtree down.
    ///
    /// Embedded screens always pass through to their parent. A stack entry
    /// pops its stack unless it sits at the bottom or the container itself
    /// asks to be skipped, in which case the whole container goes. A
    /// presented screen is the anchor unless its presenter asks to be
    /// skipped. The walk runs between suspension points, so the topology it
    /// sees is consistent.
    fn resolve(&self, requester: ScreenId) -> Result<Resolution> {
        if self.backend.in_transition(requester) {
            return Err(Error::AlreadyInProgress(requester));
        }
        let mut current = requester;
        let mut skipped = Vec::new();
        loop {
            match self.backend.ownership(current)? {
                Ownership::Root | Ownership::Detached => {
                    return Ok(Resolution {
                        teardown: Teardown::None,
                        skipped,
                    });
                }
                Ownership::Embedded { parent } => {
                    debug!("{} passes through to embedding parent {}", current, parent);
                    skipped.push(current);
                    current = parent;
                }
                Ownership::Stacked { container, index } => {
                    if self.skips(container) {
                        // the container collapses with everything it holds,
                        // entries below the requester included
                        skipped.push(current);
                        current = container;
                    } else if index > 0 {
                        return Ok(Resolution {
                            teardown: Teardown::Pop {
                                container,
                                to: index - 1,
                            },
                            skipped,
                        });
                    } else {
                        // bottom entry: popping would leave an empty container
                        skipped.push(current);
                        current = container;
                    }
                }
                Ownership::Presented { presenter } => {
                    if self.skips(presenter) {
                        skipped.push(current);
                        current = presenter;
                    } else {
                        return Ok(Resolution {
                            teardown: Teardown::Dismiss(current),
                            skipped,
                        });
                    }
                }
            }
        }
    }

    /// Skip flags on the root are ignored; the walk always stops there.
    fn skips(&self, screen: ScreenId) -> bool {
        self.backend.skip_on_dismiss(screen)
            && !matches!(self.backend.ownership(screen), Ok(Ownership::Root))
    }

    fn notify_skipped(&self, skipped: &[ScreenId]) {
        for &screen in skipped {
            match self.backend.module_input(screen) {
                Some(module) => {
                    debug!("Notifying module of {} it was skipped on dismiss", screen);
                    module.did_skip_on_dismiss();
                }
                None => debug!("No module registered for skipped {}", screen),
            }
        }
    }

    fn set_state(&self, id: Uuid, state: RequestState) {
        if let Some(request) = self.lock_requests().get_mut(&id) {
            debug!("Request {} -> {:?}", id, state);
            request.state = state;
        }
    }

    fn lock_requests(&self) -> MutexGuard<'_, HashMap<Uuid, DismissalRequest>> {
        self.requests.lock().expect("request table lock poisoned")
    }
}
