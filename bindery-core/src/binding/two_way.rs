//! Two-way Binding
//!
//! A TwoWayBinding keeps two cells in sync in both directions. It is a
//! single edge attached to both cells, so attach and detach are atomic.
//!
//! # Re-entrancy
//!
//! Writing the other side triggers that side's observers, which include this
//! very edge. The edge records which side it is currently propagating from
//! and ignores every notification that arrives while that write is in
//! flight, so a change crosses the edge exactly once.
//!
//! # Initial Sync
//!
//! On construction the **target's** current value is copied into the source.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::{Attachment, Edge, EdgeKind};
use crate::error::Result;
use crate::reactive::{CellId, Observer, ObserverId, Property, Source};

type Push = Box<dyn Fn() -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Target,
    Source,
}

struct TwoWay {
    attachment: Attachment,
    target_id: CellId,
    source_id: CellId,
    to_target: Push,
    to_source: Push,
    propagating: Mutex<Option<Side>>,
}

impl TwoWay {
    /// Push a change that originated on `from` across to the other side.
    fn push_from(&self, from: Side) -> Result<()> {
        {
            let mut propagating = self.propagating.lock();
            if let Some(active) = *propagating {
                trace!(
                    edge = self.attachment.id().raw(),
                    ?active,
                    "suppressed two-way write-back"
                );
                return Ok(());
            }
            *propagating = Some(from);
        }
        let _reset = ResetOnDrop(&self.propagating);

        match from {
            Side::Target => (self.to_source)(),
            Side::Source => (self.to_target)(),
        }
    }
}

struct ResetOnDrop<'a>(&'a Mutex<Option<Side>>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl Observer for TwoWay {
    fn observer_id(&self) -> ObserverId {
        self.attachment.id()
    }

    fn on_change(&self, source: CellId) -> Result<()> {
        if !self.attachment.is_attached() {
            return Ok(());
        }
        if source == self.target_id {
            self.push_from(Side::Target)
        } else if source == self.source_id {
            self.push_from(Side::Source)
        } else {
            Ok(())
        }
    }
}

/// A bidirectional edge between two cells.
///
/// # Example
///
/// ```rust,ignore
/// // moving the transform moves the light, and vice versa
/// let sync = TwoWayBinding::new(&transform.position, &light.position)?;
/// ```
#[derive(Clone)]
pub struct TwoWayBinding {
    inner: Arc<TwoWay>,
}

impl TwoWayBinding {
    /// Keep `target` and `source` equal. `target` wins the initial sync.
    pub fn new<T>(target: &Property<T>, source: &Property<T>) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::map(target, source, T::clone, T::clone)
    }

    /// Keep `target == to_target(source)` and `source == to_source(target)`.
    ///
    /// The two projections should be inverses of each other, otherwise the
    /// cells settle on whichever side was written last.
    pub fn map<A, B, F, G>(
        target: &Property<A>,
        source: &Property<B>,
        to_target: F,
        to_source: G,
    ) -> Result<Self>
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        F: Fn(&B) -> A + Send + Sync + 'static,
        G: Fn(&A) -> B + Send + Sync + 'static,
    {
        let push_to_target: Push = {
            let (target, source) = (target.clone(), source.clone());
            Box::new(move || {
                let value = source.with(&to_target);
                target.set(value)
            })
        };
        let push_to_source: Push = {
            let (target, source) = (target.clone(), source.clone());
            Box::new(move || {
                let value = target.with(&to_source);
                source.set(value)
            })
        };

        let inner = Arc::new(TwoWay {
            attachment: Attachment::new(
                EdgeKind::TwoWay,
                vec![target.clone_source(), source.clone_source()],
            ),
            target_id: target.id(),
            source_id: source.id(),
            to_target: push_to_target,
            to_source: push_to_source,
            propagating: Mutex::new(None),
        });
        let observer: Weak<dyn Observer> = Arc::downgrade(&inner) as Weak<dyn Observer>;
        inner.attachment.attach(observer);

        inner.push_from(Side::Target)?;
        Ok(Self { inner })
    }
}

impl Edge for TwoWayBinding {
    fn id(&self) -> ObserverId {
        self.inner.attachment.id()
    }

    fn kind(&self) -> EdgeKind {
        self.inner.attachment.kind()
    }

    fn detach(&self) {
        self.inner.attachment.detach();
    }

    fn is_attached(&self) -> bool {
        self.inner.attachment.is_attached()
    }
}

impl std::fmt::Debug for TwoWayBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoWayBinding")
            .field("id", &self.id())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::NotifyBinding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn count_changes(property: &Property<i32>) -> (Arc<AtomicUsize>, NotifyBinding) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let binding = NotifyBinding::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            &[property],
        );
        (hits, binding)
    }

    #[test]
    fn target_wins_initial_sync() {
        let target = Property::new(7);
        let source = Property::new(1);

        let _sync = TwoWayBinding::new(&target, &source).unwrap();
        assert_eq!(target.get(), 7);
        assert_eq!(source.get(), 7);
    }

    #[test]
    fn either_side_updates_the_other() {
        let a = Property::new(0);
        let b = Property::new(0);
        let _sync = TwoWayBinding::new(&a, &b).unwrap();

        a.set(3).unwrap();
        assert_eq!(b.get(), 3);

        b.set(9).unwrap();
        assert_eq!(a.get(), 9);
    }

    #[test]
    fn each_change_crosses_exactly_once() {
        let a = Property::new(0);
        let b = Property::new(0);
        let _sync = TwoWayBinding::new(&a, &b).unwrap();

        let (a_hits, _a_watch) = count_changes(&a);
        let (b_hits, _b_watch) = count_changes(&b);

        a.set(1).unwrap();
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);

        b.set(2).unwrap();
        assert_eq!(a_hits.load(Ordering::SeqCst), 2);
        assert_eq!(b_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mapped_sync_converges() {
        let celsius = Property::new(100.0_f64);
        let fahrenheit = Property::new(0.0_f64);

        let _sync = TwoWayBinding::map(
            &celsius,
            &fahrenheit,
            |f| (f - 32.0) * 5.0 / 9.0,
            |c| c * 9.0 / 5.0 + 32.0,
        )
        .unwrap();
        assert_eq!(fahrenheit.get(), 212.0);

        fahrenheit.set(32.0).unwrap();
        assert_eq!(celsius.get(), 0.0);
    }

    #[test]
    fn detach_breaks_both_directions() {
        let a = Property::new(0);
        let b = Property::new(0);
        let sync = TwoWayBinding::new(&a, &b).unwrap();

        sync.detach();
        sync.detach();
        a.set(1).unwrap();
        b.set(2).unwrap();

        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(a.observer_count(), 0);
        assert_eq!(b.observer_count(), 0);
    }

    #[test]
    fn chained_two_way_bindings_stay_bounded() {
        let a = Property::new(1);
        let b = Property::new(0);
        let c = Property::new(0);
        let _ab = TwoWayBinding::new(&a, &b).unwrap();
        let _bc = TwoWayBinding::new(&b, &c).unwrap();
        assert_eq!(c.get(), 1);

        c.set(5).unwrap();
        assert_eq!(a.get(), 5);
        assert_eq!(b.get(), 5);
    }
}
