//! List Property Implementation
//!
//! A ListProperty is the reactive ordered collection. Where a [`Property`]
//! announces whole-value replacement, a list announces structural edits:
//! an element inserted at an index, an element removed from an index, or the
//! whole list cleared.
//!
//! Two kinds of observers can attach:
//!
//! - **Structural listeners** ([`ListObserver`]) receive every [`ListEvent`].
//!   [`ListBinding`](crate::binding::ListBinding) is the built-in one.
//! - **Dependency observers** ([`Observer`]) only learn that the list changed.
//!   This is how a `Binding` or `NotifyBinding` depends on a list.
//!
//! On each edit, structural listeners run first, then dependency observers,
//! each group in attachment order. Propagation is synchronous and
//! depth-first, exactly like a property.
//!
//! [`Property`]: super::Property

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::observer::{CellId, Observer, ObserverId, ObserverList, Source};
use super::propagation::PropagationScope;
use crate::error::{BindError, Result};

/// A structural change to a [`ListProperty`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent<T> {
    /// `value` now sits at `index`; later elements shifted right.
    Inserted { index: usize, value: T },
    /// `value` was removed from `index`; later elements shifted left.
    Removed { index: usize, value: T },
    /// Every element was removed.
    Cleared,
}

/// Receives the structural events of a list.
pub trait ListObserver<T>: Send + Sync {
    /// The observer's unique ID.
    fn observer_id(&self) -> ObserverId;

    /// Called after `event` was applied to the list identified by `source`.
    fn on_list_event(&self, source: CellId, event: &ListEvent<T>) -> Result<()>;
}

struct ListInner<T> {
    id: CellId,
    items: RwLock<Vec<T>>,
    listeners: Mutex<ObserverList<dyn ListObserver<T>>>,
    observers: Mutex<ObserverList<dyn Observer>>,
}

/// A reactive ordered collection of T.
///
/// Cloning a `ListProperty` creates a new handle to the **same** list.
pub struct ListProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ListInner<T>>,
}

impl<T> ListProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`, in order.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Arc::new(ListInner {
                id: CellId::next(),
                items: RwLock::new(items),
                listeners: Mutex::new(ObserverList::new()),
                observers: Mutex::new(ObserverList::new()),
            }),
        }
    }

    /// Get the list's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        let items = self.inner.items.read();
        items.get(index).cloned().ok_or(BindError::IndexOutOfRange {
            index,
            len: items.len(),
        })
    }

    /// Copy of every element, in order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.read().clone()
    }

    /// Borrow the elements without cloning them.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.read())
    }

    /// Append an element.
    pub fn push(&self, value: T) -> Result<()> {
        let index = {
            let mut items = self.inner.items.write();
            items.push(value.clone());
            items.len() - 1
        };
        self.emit(ListEvent::Inserted { index, value })
    }

    /// Insert an element at `index`, shifting later elements right.
    ///
    /// `index == len()` appends.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        {
            let mut items = self.inner.items.write();
            if index > items.len() {
                return Err(BindError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value.clone());
        }
        self.emit(ListEvent::Inserted { index, value })
    }

    /// Remove and return the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let value = {
            let mut items = self.inner.items.write();
            if index >= items.len() {
                return Err(BindError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.emit(ListEvent::Removed {
            index,
            value: value.clone(),
        })?;
        Ok(value)
    }

    /// Replace the element at `index`. Announced as a removal followed by an
    /// insertion at the same index.
    pub fn set_at(&self, index: usize, value: T) -> Result<()> {
        self.remove_at(index)?;
        self.insert(index, value)
    }

    /// Remove every element. Clearing an empty list is not an error.
    pub fn clear(&self) -> Result<()> {
        self.inner.items.write().clear();
        self.emit(ListEvent::Cleared)
    }

    /// Replace the whole contents: a clear followed by one insertion per item.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.clear()?;
        for item in items {
            self.push(item)?;
        }
        Ok(())
    }

    /// Attach a structural listener. Attaching the same ID twice is ignored.
    pub fn attach_listener(&self, id: ObserverId, listener: Weak<dyn ListObserver<T>>) {
        self.inner.listeners.lock().attach(id, listener);
    }

    /// Detach a structural listener. Unknown IDs are ignored.
    pub fn detach_listener(&self, id: ObserverId) {
        self.inner.listeners.lock().detach(id);
    }

    /// Number of live structural listeners plus dependency observers.
    pub fn observer_count(&self) -> usize {
        self.inner.listeners.lock().len() + self.inner.observers.lock().len()
    }

    /// Whether two handles point at the same list.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit(&self, event: ListEvent<T>) -> Result<()> {
        let listeners = self.inner.listeners.lock().live();
        let observers = self.inner.observers.lock().live();
        if listeners.is_empty() && observers.is_empty() {
            return Ok(());
        }

        let _scope = PropagationScope::enter(self.id())?;
        for listener in listeners {
            trace!(
                list = self.id().raw(),
                listener = listener.observer_id().raw(),
                "propagating list event"
            );
            listener.on_list_event(self.id(), &event)?;
        }
        for observer in observers {
            observer.on_change(self.id())?;
        }
        Ok(())
    }
}

impl<T> Source for ListProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn cell_id(&self) -> CellId {
        self.id()
    }

    fn attach_observer(&self, id: ObserverId, observer: Weak<dyn Observer>) {
        self.inner.observers.lock().attach(id, observer);
    }

    fn detach_observer(&self, id: ObserverId) {
        self.inner.observers.lock().detach(id);
    }

    fn observer_count(&self) -> usize {
        ListProperty::observer_count(self)
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }
}

impl<T> Default for ListProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Lists compare by element sequence, not identity.
impl<T> PartialEq for ListProperty<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let ours = self.to_vec();
        other.with(|theirs| ours.as_slice() == theirs)
    }
}

impl<T> Debug for ListProperty<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListProperty")
            .field("id", &self.id())
            .field("items", &*self.inner.items.read())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
