//! Binding Primitives
//!
//! Bindings are the edges of the dataflow graph. Each one is a first-class
//! object that attaches itself to the cells it reads from on construction and
//! detaches from all of them on [`Edge::detach`] or when its last handle is
//! dropped.
//!
//! # Edge Kinds
//!
//! - [`Binding`]: one-way projection from one or more sources into a target.
//!   Runs once on construction so the target starts consistent.
//! - [`TwoWayBinding`]: keeps two cells equal (per projection) in both
//!   directions, suppressing its own write-backs.
//! - [`NotifyBinding`]: runs a callback when any dependency changes. Does
//!   **not** run on construction.
//! - [`ListBinding`]: receives the structural events of a list, or mirrors
//!   one list into another.
//!
//! # Ownership
//!
//! Cells hold only weak references to edges. Whoever holds the edge handle
//! (usually the owning [`Entity`](crate::entity::Entity)) keeps it alive, and
//! dropping it is enough to stop propagation. Forgetting to detach therefore
//! cannot leave a dangling listener behind.

mod list;
mod notify;
mod one_way;
mod two_way;

pub use list::ListBinding;
pub use notify::NotifyBinding;
pub use one_way::Binding;
pub use two_way::TwoWayBinding;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use tracing::debug;

use crate::reactive::{Observer, ObserverId, Source};

/// What kind of edge an [`Edge`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    OneWay,
    TwoWay,
    Notify,
    List,
}

/// Common interface of every binding.
pub trait Edge: Send + Sync {
    /// The edge's unique ID, as registered on its cells.
    fn id(&self) -> ObserverId;

    /// What kind of edge this is.
    fn kind(&self) -> EdgeKind;

    /// Remove the edge from every cell it observes. Idempotent.
    fn detach(&self);

    /// Whether the edge is still attached.
    fn is_attached(&self) -> bool;
}

/// The set of sources an edge observes and whether it is attached to them.
///
/// Detaches on drop, so an edge whose last handle goes away leaves nothing
/// behind on its cells.
pub(crate) struct Attachment {
    id: ObserverId,
    kind: EdgeKind,
    attached: AtomicBool,
    sources: Vec<Box<dyn Source>>,
}

impl Attachment {
    pub(crate) fn new(kind: EdgeKind, sources: Vec<Box<dyn Source>>) -> Self {
        Self {
            id: ObserverId::new(),
            kind,
            attached: AtomicBool::new(false),
            sources,
        }
    }

    /// Collect owned handles to a slice of borrowed dependencies.
    pub(crate) fn collect(deps: &[&dyn Source]) -> Vec<Box<dyn Source>> {
        deps.iter().map(|dep| dep.clone_source()).collect()
    }

    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }

    pub(crate) fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub(crate) fn attach(&self, observer: Weak<dyn Observer>) {
        for source in &self.sources {
            source.attach_observer(self.id, observer.clone());
        }
        self.attached.store(true, Ordering::SeqCst);
        debug!(
            edge = self.id.raw(),
            kind = ?self.kind,
            sources = self.sources.len(),
            "edge attached"
        );
    }

    pub(crate) fn detach(&self) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }
        for source in &self.sources {
            source.detach_observer(self.id);
        }
        debug!(edge = self.id.raw(), kind = ?self.kind, "edge detached");
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.detach();
    }
}
