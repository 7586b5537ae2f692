//! Shared helpers for the dismissal behaviour suites

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Completion, StageBackend};
use crate::memory::MemoryBackend;
use crate::module::{ModuleHandle, ModuleInput};
use crate::navigator::Navigator;
use crate::screen::{Ownership, ScreenId};
use crate::{Error, Result};

/// Module stub that counts its skip notifications.
pub struct CountingModule {
    skipped: AtomicUsize,
}

impl CountingModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            skipped: AtomicUsize::new(0),
        })
    }

    pub fn skip_count(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }
}

impl ModuleInput for CountingModule {
    fn did_skip_on_dismiss(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend and navigator whose transitions settle immediately.
pub fn instant_harness() -> (MemoryBackend, Navigator) {
    let backend = MemoryBackend::new();
    let navigator = Navigator::new(backend.clone());
    (backend, navigator)
}

/// Backend and navigator whose animated transitions take `delay_ms` of
/// simulated time.
pub fn animated_harness(delay_ms: u64) -> (MemoryBackend, Navigator) {
    let backend = MemoryBackend::new().with_transition_delay(Duration::from_millis(delay_ms));
    let navigator = Navigator::new(backend.clone());
    (backend, navigator)
}

/// Present `depth` screens as a modal chain under the root.
/// Returns the chain outermost first.
pub async fn present_chain(backend: &MemoryBackend, depth: usize) -> Vec<ScreenId> {
    let mut chain = Vec::with_capacity(depth);
    let mut top = backend.root();
    for _ in 0..depth {
        let screen = backend.add_screen();
        backend
            .present(top, screen, false)
            .finished()
            .await
            .expect("Failed to present chain screen");
        chain.push(screen);
        top = screen;
    }
    chain
}

/// Build a container with `depth` pushed entries and present it under the
/// root. Returns the container and its entries, bottom first.
pub async fn present_stack(backend: &MemoryBackend, depth: usize) -> (ScreenId, Vec<ScreenId>) {
    let container = backend.add_screen();
    let mut entries = Vec::with_capacity(depth);
    for _ in 0..depth {
        let entry = backend.add_screen();
        backend.push(container, entry).expect("Failed to push entry");
        entries.push(entry);
    }
    backend
        .present(backend.root(), container, false)
        .finished()
        .await
        .expect("Failed to present container");
    (container, entries)
}

/// Attach a counting module to `screen` and hand its counter back.
pub fn track_module(backend: &MemoryBackend, screen: ScreenId) -> Arc<CountingModule> {
    let module = CountingModule::new();
    backend
        .set_module_input(screen, module.clone())
        .expect("Failed to register module");
    module
}

/// Backend wrapper whose teardown transitions always fail.
///
/// Everything else delegates, so chains can be built normally before the
/// failure is injected.
#[derive(Clone)]
pub struct FailingBackend {
    inner: MemoryBackend,
}

impl FailingBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self { inner }
    }
}

impl StageBackend for FailingBackend {
    fn present(&self, presenter: ScreenId, child: ScreenId, animated: bool) -> Completion {
        self.inner.present(presenter, child, animated)
    }

    fn dismiss(&self, _screen: ScreenId, _animated: bool) -> Completion {
        Completion::ready(Err(Error::Backend("simulated dismiss failure".into())))
    }

    fn pop_stack(&self, _container: ScreenId, _to_index: usize, _animated: bool) -> Completion {
        Completion::ready(Err(Error::Backend("simulated pop failure".into())))
    }

    fn attach_child(&self, parent: ScreenId, child: ScreenId) -> Result<()> {
        self.inner.attach_child(parent, child)
    }

    fn detach_child(&self, child: ScreenId) -> Result<()> {
        self.inner.detach_child(child)
    }

    fn ownership(&self, screen: ScreenId) -> Result<Ownership> {
        self.inner.ownership(screen)
    }

    fn skip_on_dismiss(&self, screen: ScreenId) -> bool {
        self.inner.skip_on_dismiss(screen)
    }

    fn in_transition(&self, screen: ScreenId) -> bool {
        self.inner.in_transition(screen)
    }

    fn module_input(&self, screen: ScreenId) -> Option<ModuleHandle> {
        self.inner.module_input(screen)
    }
}
