//! Screen arena and presentation-chain bookkeeping
//!
//! Owns every screen record for one host window: modal edges, navigation
//! stacks, embedded children, per-screen flags, and module associations.
//! Teardown detaches subtrees instead of deleting them, so ids stay valid
//! for modules that outlive their screens.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::module::ModuleHandle;
use crate::screen::{Ownership, ScreenId};
use crate::{Error, Result};

/// One arena record: a screen plus everything it owns.
struct ScreenRecord {
    ownership: Ownership,
    skip_on_dismiss: bool,
    in_transition: bool,
    presented: Option<ScreenId>,
    stack: Vec<ScreenId>,
    embedded: Vec<ScreenId>,
    module_input: Option<ModuleHandle>,
    output: Option<ModuleHandle>,
}

impl ScreenRecord {
    fn detached() -> Self {
        Self {
            ownership: Ownership::Detached,
            skip_on_dismiss: false,
            in_transition: false,
            presented: None,
            stack: Vec::new(),
            embedded: Vec::new(),
            module_input: None,
            output: None,
        }
    }
}

/// Arena of every screen known to one host window.
///
/// The stage tracks ownership edges only; it never runs transitions itself.
/// A presentation backend mutates it when a transition starts and finishes.
pub struct Stage {
    records: HashMap<ScreenId, ScreenRecord>,
    root: ScreenId,
    next_id: u64,
}

impl Stage {
    /// Create a stage containing only the root screen.
    pub fn new() -> Self {
        let root = ScreenId(0);
        let mut records = HashMap::new();
        records.insert(
            root,
            ScreenRecord {
                ownership: Ownership::Root,
                ..ScreenRecord::detached()
            },
        );
        Self {
            records,
            root,
            next_id: 1,
        }
    }

    /// The root screen of this stage
    pub fn root(&self) -> ScreenId {
        self.root
    }

    /// Number of screens the stage knows about, detached ones included
    pub fn screen_count(&self) -> usize {
        self.records.len()
    }

    /// Register a new screen. It starts detached.
    pub fn add_screen(&mut self) -> ScreenId {
        let id = ScreenId(self.next_id);
        self.next_id += 1;
        self.records.insert(id, ScreenRecord::detached());
        debug!("Registered {}", id);
        id
    }

    /// Wire a modal presentation edge from `presenter` to `child`.
    ///
    /// The child must be detached and the presenter must be reachable from
    /// the root; pre-built detached subtrees can only use stack and embed
    /// edges until they are presented.
    pub fn attach_presented(&mut self, presenter: ScreenId, child: ScreenId) -> Result<()> {
        if self.record(child)?.ownership != Ownership::Detached {
            return Err(Error::AlreadyOwned(child));
        }
        if self.record(presenter)?.presented.is_some() {
            return Err(Error::AlreadyPresenting(presenter));
        }
        if !self.is_live(presenter) {
            return Err(Error::NotAttached(presenter));
        }
        self.record_mut(presenter)?.presented = Some(child);
        self.record_mut(child)?.ownership = Ownership::Presented { presenter };
        debug!("Wired modal edge: {} above {}", child, presenter);
        Ok(())
    }

    /// Push `child` onto `container`'s navigation stack.
    ///
    /// The container may itself still be detached, which is how stacks are
    /// pre-built before the container is presented.
    pub fn push(&mut self, container: ScreenId, child: ScreenId) -> Result<()> {
        if self.record(child)?.ownership != Ownership::Detached {
            return Err(Error::AlreadyOwned(child));
        }
        self.record(container)?;
        if container == child || self.is_ancestor_of(child, container) {
            return Err(Error::WouldCycle(child));
        }
        let index = {
            let record = self.record_mut(container)?;
            record.stack.push(child);
            record.stack.len() - 1
        };
        self.record_mut(child)?.ownership = Ownership::Stacked { container, index };
        debug!("Pushed {} onto {} at index {}", child, container, index);
        Ok(())
    }

    /// Embed `child` inside `parent` as a pass-through container.
    pub fn attach_embedded(&mut self, parent: ScreenId, child: ScreenId) -> Result<()> {
        if self.record(child)?.ownership != Ownership::Detached {
            return Err(Error::AlreadyOwned(child));
        }
        self.record(parent)?;
        if parent == child || self.is_ancestor_of(child, parent) {
            return Err(Error::WouldCycle(child));
        }
        self.record_mut(parent)?.embedded.push(child);
        self.record_mut(child)?.ownership = Ownership::Embedded { parent };
        debug!("Embedded {} inside {}", child, parent);
        Ok(())
    }

    /// Remove an embedded child from its parent.
    ///
    /// The child keeps whatever it owns; only the embed edge is cut.
    pub fn detach_embedded(&mut self, child: ScreenId) -> Result<()> {
        let parent = match self.record(child)?.ownership {
            Ownership::Embedded { parent } => parent,
            _ => return Err(Error::NotAttached(child)),
        };
        self.record_mut(parent)?.embedded.retain(|id| *id != child);
        self.record_mut(child)?.ownership = Ownership::Detached;
        debug!("Detached embedded child {} from {}", child, parent);
        Ok(())
    }

    /// Truncate `container`'s stack so that `index` becomes the top entry.
    ///
    /// Popped entries are detached and their subtrees released. Returns the
    /// removed entries in stack order.
    pub fn pop_to(&mut self, container: ScreenId, index: usize) -> Result<Vec<ScreenId>> {
        let removed = {
            let record = self.record_mut(container)?;
            if index >= record.stack.len() {
                return Err(Error::StackIndexOutOfRange { container, index });
            }
            record.stack.split_off(index + 1)
        };
        for &entry in &removed {
            if let Some(record) = self.records.get_mut(&entry) {
                record.ownership = Ownership::Detached;
            }
            self.release_descendants(entry);
        }
        if !removed.is_empty() {
            debug!(
                "Popped {} entries off {} down to index {}",
                removed.len(),
                container,
                index
            );
        }
        Ok(removed)
    }

    /// Detach `id` from its owner and release everything it transitively owns.
    ///
    /// Modal edges inside the subtree are broken, matching how a window tears
    /// down a dismissed chain. Stack and embed wiring inside the subtree is
    /// kept, so a dismissed container still holds its entries and can be
    /// presented again later.
    pub fn detach_subtree(&mut self, id: ScreenId) -> Result<()> {
        let ownership = self.record(id)?.ownership;
        match ownership {
            Ownership::Root | Ownership::Detached => return Err(Error::NotAttached(id)),
            Ownership::Presented { presenter } => {
                self.record_mut(presenter)?.presented = None;
            }
            Ownership::Stacked { container, .. } => {
                let survivors = {
                    let record = self.record_mut(container)?;
                    record.stack.retain(|entry| *entry != id);
                    record.stack.clone()
                };
                for (position, entry) in survivors.into_iter().enumerate() {
                    if let Some(record) = self.records.get_mut(&entry) {
                        record.ownership = Ownership::Stacked {
                            container,
                            index: position,
                        };
                    }
                }
            }
            Ownership::Embedded { parent } => {
                self.record_mut(parent)?.embedded.retain(|entry| *entry != id);
            }
        }
        self.record_mut(id)?.ownership = Ownership::Detached;
        self.release_descendants(id);
        debug!("Detached subtree rooted at {}", id);
        Ok(())
    }

    /// Flag or unflag every screen in the subtree rooted at `id` as part of a
    /// running transition.
    pub(crate) fn mark_subtree(&mut self, id: ScreenId, in_transition: bool) {
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let owned = match self.records.get_mut(&current) {
                Some(record) => {
                    record.in_transition = in_transition;
                    let mut owned: Vec<ScreenId> = record.stack.clone();
                    owned.extend(record.embedded.iter().copied());
                    owned.extend(record.presented);
                    owned
                }
                None => continue,
            };
            queue.extend(owned);
        }
    }

    /// First screen in the subtree rooted at `id` that is mid-transition, if
    /// any.
    pub fn subtree_in_transition(&self, id: ScreenId) -> Option<ScreenId> {
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let record = match self.records.get(&current) {
                Some(record) => record,
                None => continue,
            };
            if record.in_transition {
                return Some(current);
            }
            queue.extend(record.stack.iter().copied());
            queue.extend(record.embedded.iter().copied());
            queue.extend(record.presented);
        }
        None
    }

    /// Current ownership edge of `id`.
    pub fn ownership(&self, id: ScreenId) -> Result<Ownership> {
        Ok(self.record(id)?.ownership)
    }

    /// Whether the stage knows this id at all
    pub fn contains(&self, id: ScreenId) -> bool {
        self.records.contains_key(&id)
    }

    /// Whether `id` is reachable from the root through ownership edges.
    pub fn is_live(&self, id: ScreenId) -> bool {
        let mut current = id;
        for _ in 0..self.records.len() {
            match self.records.get(&current).map(|record| record.ownership) {
                Some(Ownership::Root) => return true,
                Some(Ownership::Detached) | None => return false,
                Some(other) => match other.owner() {
                    Some(owner) => current = owner,
                    None => return false,
                },
            }
        }
        false
    }

    /// The modal child of `id`, if one is presented
    pub fn presented_of(&self, id: ScreenId) -> Option<ScreenId> {
        self.records.get(&id).and_then(|record| record.presented)
    }

    /// The navigation stack of `id`, bottom first
    pub fn stack_of(&self, id: ScreenId) -> &[ScreenId] {
        self.records
            .get(&id)
            .map(|record| record.stack.as_slice())
            .unwrap_or(&[])
    }

    /// The embedded children of `id`
    pub fn embedded_of(&self, id: ScreenId) -> &[ScreenId] {
        self.records
            .get(&id)
            .map(|record| record.embedded.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` is currently covered by a running transition
    pub fn in_transition(&self, id: ScreenId) -> bool {
        self.records
            .get(&id)
            .is_some_and(|record| record.in_transition)
    }

    /// Whether `id` asks to be skipped when a descendant dismisses through it
    pub fn skip_on_dismiss(&self, id: ScreenId) -> bool {
        self.records
            .get(&id)
            .is_some_and(|record| record.skip_on_dismiss)
    }

    /// Set or clear the skip-on-dismiss flag of `id`.
    pub fn set_skip_on_dismiss(&mut self, id: ScreenId, skip: bool) -> Result<()> {
        self.record_mut(id)?.skip_on_dismiss = skip;
        Ok(())
    }

    /// Associate the module input handle of `id` explicitly.
    pub fn set_module_input(&mut self, id: ScreenId, module: ModuleHandle) -> Result<()> {
        self.record_mut(id)?.module_input = Some(module);
        Ok(())
    }

    /// Associate the module output handle of `id`.
    ///
    /// Used as a fallback when no explicit input was registered.
    pub fn set_output(&mut self, id: ScreenId, output: ModuleHandle) -> Result<()> {
        self.record_mut(id)?.output = Some(output);
        Ok(())
    }

    /// The module handle behind `id`: the explicit input if registered,
    /// otherwise the output.
    pub fn module_input(&self, id: ScreenId) -> Option<ModuleHandle> {
        let record = self.records.get(&id)?;
        record
            .module_input
            .clone()
            .or_else(|| record.output.clone())
    }

    /// Serializable description of the whole arena.
    pub fn snapshot(&self) -> StageSnapshot {
        let mut screens: Vec<ScreenSnapshot> = self
            .records
            .iter()
            .map(|(id, record)| ScreenSnapshot {
                id: *id,
                ownership: record.ownership,
                skip_on_dismiss: record.skip_on_dismiss,
                in_transition: record.in_transition,
                presented: record.presented,
                stack: record.stack.clone(),
                embedded: record.embedded.clone(),
            })
            .collect();
        screens.sort_by_key(|screen| screen.id);
        StageSnapshot {
            root: self.root,
            screens,
        }
    }

    fn record(&self, id: ScreenId) -> Result<&ScreenRecord> {
        self.records.get(&id).ok_or(Error::UnknownScreen(id))
    }

    fn record_mut(&mut self, id: ScreenId) -> Result<&mut ScreenRecord> {
        self.records.get_mut(&id).ok_or(Error::UnknownScreen(id))
    }

    /// Break every modal edge in the subtree rooted at `id` and clear the
    /// transition flags, keeping stack and embed wiring intact.
    fn release_descendants(&mut self, id: ScreenId) {
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let (modal, owned) = match self.records.get_mut(&current) {
                Some(record) => {
                    record.in_transition = false;
                    let modal = record.presented.take();
                    let mut owned: Vec<ScreenId> = record.stack.clone();
                    owned.extend(record.embedded.iter().copied());
                    (modal, owned)
                }
                None => continue,
            };
            if let Some(modal) = modal {
                if let Some(record) = self.records.get_mut(&modal) {
                    record.ownership = Ownership::Detached;
                }
                queue.push_back(modal);
            }
            queue.extend(owned);
        }
    }

    /// Walk ownership edges up from `id`, checking whether `ancestor` owns it
    /// at any remove.
    fn is_ancestor_of(&self, ancestor: ScreenId, id: ScreenId) -> bool {
        let mut current = id;
        for _ in 0..self.records.len() {
            let owner = match self
                .records
                .get(&current)
                .and_then(|record| record.ownership.owner())
            {
                Some(owner) => owner,
                None => return false,
            };
            if owner == ancestor {
                return true;
            }
            current = owner;
        }
        false
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable description of one screen record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenSnapshot {
    /// Screen id
    pub id: ScreenId,
    /// Current ownership edge
    pub ownership: Ownership,
    /// Skip-on-dismiss flag
    pub skip_on_dismiss: bool,
    /// Whether a transition currently covers the screen
    pub in_transition: bool,
    /// Modal child, if presented
    pub presented: Option<ScreenId>,
    /// Navigation stack, bottom first
    pub stack: Vec<ScreenId>,
    /// Embedded children
    pub embedded: Vec<ScreenId>,
}

/// Serializable description of the whole arena, ordered by screen id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    /// The root screen
    pub root: ScreenId,
    /// Every known screen, detached ones included
    pub screens: Vec<ScreenSnapshot>,
}
