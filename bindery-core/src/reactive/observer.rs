//! Observer types for the reactive system.
//!
//! An Observer is anything attached to a cell that must hear about changes:
//! one-way bindings, two-way bindings and notify bindings. Cells never own
//! their observers. They keep weak references in attachment order, and the
//! edge that created the attachment is responsible for removing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use crate::error::Result;

/// Unique identifier for an observer edge.
///
/// Each binding gets a unique ID when created. The ID is what a cell uses to
/// find the edge again on detach, and what keeps an edge from being attached
/// twice to the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a cell or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Something that is told when a cell it observes has changed.
///
/// `on_change` runs synchronously inside the source's `set`. Any error it
/// returns unwinds the whole propagation chain.
pub trait Observer: Send + Sync {
    /// The observer's unique ID.
    fn observer_id(&self) -> ObserverId;

    /// Called after the cell identified by `source` changed.
    fn on_change(&self, source: CellId) -> Result<()>;
}

/// A cell or collection that edges can observe.
///
/// This is the type-erased view a binding keeps of its dependencies so that
/// it can detach itself from all of them, whatever their value types.
pub trait Source: Send + Sync {
    /// The observed cell's ID.
    fn cell_id(&self) -> CellId;

    /// Attach an observer. Attaching the same ID twice is ignored.
    fn attach_observer(&self, id: ObserverId, observer: Weak<dyn Observer>);

    /// Detach an observer. Detaching an unknown ID is a no-op.
    fn detach_observer(&self, id: ObserverId);

    /// Number of live observers.
    fn observer_count(&self) -> usize;

    /// Clone this source into an owned, type-erased handle.
    fn clone_source(&self) -> Box<dyn Source>;
}

/// Weak, insertion-ordered observer registry.
///
/// Generic over the observer trait object so that lists can keep structural
/// listeners separate from plain change observers.
pub(crate) struct ObserverList<O: ?Sized> {
    entries: SmallVec<[(ObserverId, Weak<O>); 4]>,
}

impl<O: ?Sized> ObserverList<O> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    /// Append an observer. Returns false if the ID was already attached.
    pub(crate) fn attach(&mut self, id: ObserverId, observer: Weak<O>) -> bool {
        if self.entries.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        self.entries.push((id, observer));
        true
    }

    /// Remove an observer. Returns false if it was not attached.
    pub(crate) fn detach(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Upgrade every live observer, in attachment order.
    ///
    /// Entries whose edge has been dropped without detaching are pruned here.
    pub(crate) fn live(&mut self) -> SmallVec<[Arc<O>; 4]> {
        let mut live = SmallVec::new();
        self.entries.retain(|(_, weak)| match weak.upgrade() {
            Some(observer) => {
                live.push(observer);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }
}

impl<O: ?Sized> Default for ObserverList<O> {
    fn default() -> Self {
        Self::new()
    }
}
