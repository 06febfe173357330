//! List Binding
//!
//! A ListBinding is the structural edge of a [`ListProperty`]. It receives
//! each insert, remove and clear as it happens, either into a callback or by
//! replaying it onto a second list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::{Edge, EdgeKind};
use crate::error::Result;
use crate::reactive::{CellId, ListEvent, ListObserver, ListProperty, ObserverId};

type Callback<T> = Box<dyn FnMut(&ListEvent<T>) -> Result<()> + Send>;

struct ListEdge<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: ObserverId,
    attached: AtomicBool,
    list: ListProperty<T>,
    callback: Mutex<Callback<T>>,
}

impl<T> ListEdge<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            self.list.detach_listener(self.id);
            debug!(edge = self.id.raw(), list = self.list.id().raw(), "list edge detached");
        }
    }
}

impl<T> ListObserver<T> for ListEdge<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn on_list_event(&self, _source: CellId, event: &ListEvent<T>) -> Result<()> {
        if !self.attached.load(Ordering::SeqCst) {
            return Ok(());
        }
        match self.callback.try_lock() {
            Some(mut callback) => (*callback)(event),
            None => Ok(()),
        }
    }
}

impl<T> Edge for ListEdge<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn id(&self) -> ObserverId {
        self.id
    }

    fn kind(&self) -> EdgeKind {
        EdgeKind::List
    }

    fn detach(&self) {
        ListEdge::detach(self);
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

impl<T> Drop for ListEdge<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        ListEdge::detach(self);
    }
}

/// A structural edge on a list.
///
/// # Example
///
/// ```rust,ignore
/// // keep the rendered waypoints in step with the agent's path
/// let markers = ListBinding::mirror(&debug_markers, &snake.path, |coord| marker_at(*coord))?;
/// ```
#[derive(Clone)]
pub struct ListBinding {
    inner: Arc<dyn Edge>,
}

impl ListBinding {
    /// Run `callback` for every structural event of `list`.
    pub fn observe<T, F>(list: &ListProperty<T>, callback: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut(&ListEvent<T>) -> Result<()> + Send + 'static,
    {
        let inner = Arc::new(ListEdge {
            id: ObserverId::new(),
            attached: AtomicBool::new(true),
            list: list.clone(),
            callback: Mutex::new(Box::new(callback)),
        });
        let listener: Weak<dyn ListObserver<T>> =
            Arc::downgrade(&inner) as Weak<dyn ListObserver<T>>;
        list.attach_listener(inner.id, listener);
        debug!(edge = inner.id.raw(), list = list.id().raw(), "list edge attached");

        Self { inner }
    }

    /// Keep `target` equal to `source` mapped through `project`, element by
    /// element and in order. Copies the current contents immediately.
    pub fn mirror<S, T, F>(target: &ListProperty<T>, source: &ListProperty<S>, project: F) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        target.replace_all(source.with(|items| items.iter().map(&project).collect::<Vec<_>>()))?;

        let target = target.clone();
        Ok(Self::observe(source, move |event| match event {
            ListEvent::Inserted { index, value } => target.insert(*index, project(value)),
            ListEvent::Removed { index, .. } => target.remove_at(*index).map(|_| ()),
            ListEvent::Cleared => target.clear(),
        }))
    }
}

impl Edge for ListBinding {
    fn id(&self) -> ObserverId {
        self.inner.id()
    }

    fn kind(&self) -> EdgeKind {
        self.inner.kind()
    }

    fn detach(&self) {
        self.inner.detach();
    }

    fn is_attached(&self) -> bool {
        self.inner.is_attached()
    }
}

impl std::fmt::Debug for ListBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListBinding")
            .field("id", &self.id())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_receives_every_event() {
        let path = ListProperty::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        let _binding = ListBinding::observe(&path, move |event: &ListEvent<(i32, i32)>| {
            log.lock().push(event.clone());
            Ok(())
        });

        path.push((0, 0)).unwrap();
        path.push((1, 0)).unwrap();
        path.remove_at(0).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[2],
            ListEvent::Removed {
                index: 0,
                value: (0, 0)
            }
        );
    }

    #[test]
    fn mirror_tracks_structure_and_order() {
        let source = ListProperty::from_vec(vec![1, 2]);
        let target = ListProperty::new();

        let _mirror = ListBinding::mirror(&target, &source, |v| v * 10).unwrap();
        assert_eq!(target.to_vec(), vec![10, 20]);

        source.insert(1, 5).unwrap();
        assert_eq!(target.to_vec(), vec![10, 50, 20]);

        source.remove_at(0).unwrap();
        assert_eq!(target.to_vec(), vec![50, 20]);

        source.clear().unwrap();
        assert!(target.is_empty());
    }

    #[test]
    fn detach_stops_mirroring() {
        let source = ListProperty::from_vec(vec!['a']);
        let target = ListProperty::new();

        let mirror = ListBinding::mirror(&target, &source, |c| *c).unwrap();
        mirror.detach();
        mirror.detach();
        source.push('b').unwrap();

        assert_eq!(target.to_vec(), vec!['a']);
        assert_eq!(source.observer_count(), 0);
    }
}
