//! Property Implementation
//!
//! A Property is the reactive value cell. It holds a value and the ordered
//! list of edges attached to it.
//!
//! # How Properties Work
//!
//! 1. Bindings attach themselves to the properties they read from. There is
//!    no automatic tracking: a property's observers are exactly the edges
//!    that were explicitly attached to it.
//!
//! 2. `set` stores the new value (through the setter hook, if one is
//!    installed) and then notifies every observer in attachment order.
//!
//! 3. Notification is synchronous and depth-first. An observer that writes
//!    another property triggers that property's observers before returning.
//!
//! # Change Policy
//!
//! By default every `set` notifies, even when the value is unchanged. Cells
//! holding `PartialEq` values can opt into [`ChangePolicy::SkipUnchanged`]
//! with [`Property::skip_unchanged`].
//!
//! # Thread Safety
//!
//! The value and observer list sit behind `parking_lot` locks so property
//! graphs are `Send + Sync`. No lock is held while observers or the setter
//! hook run, which is what makes re-entrant propagation safe.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use super::observer::{CellId, Observer, ObserverId, ObserverList, Source};
use super::propagation::PropagationScope;
use crate::error::{BindError, Result};

/// Setter hook: receives the property and the incoming value and decides
/// what to store. The hook stores with [`Property::store`], which does not
/// notify; `set` notifies once the hook returns.
pub type Setter<T> = Arc<dyn Fn(&Property<T>, T) -> Result<()> + Send + Sync>;

/// Whether `set` notifies when the value did not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    /// Notify on every `set`.
    #[default]
    Always,
    /// Skip notification when the stored value equals the previous one.
    SkipUnchanged,
}

struct PropertyInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: CellId,
    value: RwLock<T>,
    observers: Mutex<ObserverList<dyn Observer>>,
    setter: RwLock<Option<Setter<T>>>,
    equals: RwLock<Option<fn(&T, &T) -> bool>>,
    editable: AtomicBool,
    locked: AtomicBool,
}

/// A reactive cell holding a value of type T.
///
/// Cloning a `Property` creates a new handle to the **same** cell.
///
/// # Example
///
/// ```rust,ignore
/// let lifetime = Property::new(0.0_f32);
/// lifetime.set(lifetime.get() + dt)?;
/// ```
pub struct Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<PropertyInner<T>>,
}

impl<T> Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new editable property with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                id: CellId::next(),
                value: RwLock::new(value),
                observers: Mutex::new(ObserverList::new()),
                setter: RwLock::new(None),
                equals: RwLock::new(None),
                editable: AtomicBool::new(true),
                locked: AtomicBool::new(false),
            }),
        }
    }

    /// Mark the property as not settable from the editor.
    pub fn read_only(self) -> Self {
        self.set_editable(false);
        self
    }

    /// Get the property's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Set a new value and notify observers.
    ///
    /// Routes through the setter hook when one is installed. Fails with
    /// [`BindError::InvalidPropagation`] if the property is locked, and with
    /// whatever error an observer raised further down the chain.
    pub fn set(&self, value: T) -> Result<()> {
        if self.is_locked() {
            return Err(BindError::InvalidPropagation {
                cell: self.id().raw(),
                reason: "cell is locked",
            });
        }

        let equals = *self.inner.equals.read();
        let previous = equals.map(|_| self.get());

        let setter = self.inner.setter.read().clone();
        match setter {
            Some(hook) => hook(self, value)?,
            None => self.store(value),
        }

        if let (Some(eq), Some(previous)) = (equals, previous) {
            if self.with(|current| eq(&previous, current)) {
                return Ok(());
            }
        }

        self.notify()
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = self.with(f);
        self.set(next)
    }

    /// Set a value on behalf of the editor.
    ///
    /// Non-editable properties reject the write. The rejection is logged and
    /// returned; it never panics.
    pub fn set_from_editor(&self, value: T) -> Result<()> {
        if !self.is_editable() {
            warn!(cell = self.id().raw(), "rejected editor write to non-editable property");
            return Err(BindError::InvalidPropagation {
                cell: self.id().raw(),
                reason: "cell is not editable",
            });
        }
        self.set(value)
    }

    /// Store a value without notifying observers or running the setter hook.
    ///
    /// This is what setter hooks call to commit the value.
    pub fn store(&self, value: T) {
        *self.inner.value.write() = value;
    }

    /// Notify every attached observer, in attachment order.
    pub fn notify(&self) -> Result<()> {
        let observers = self.inner.observers.lock().live();
        if observers.is_empty() {
            return Ok(());
        }

        let _scope = PropagationScope::enter(self.id())?;
        for observer in observers {
            trace!(
                cell = self.id().raw(),
                observer = observer.observer_id().raw(),
                "propagating change"
            );
            observer.on_change(self.id())?;
        }
        Ok(())
    }

    /// Install a setter hook that intercepts every `set`.
    pub fn set_setter<F>(&self, hook: F)
    where
        F: Fn(&Property<T>, T) -> Result<()> + Send + Sync + 'static,
    {
        *self.inner.setter.write() = Some(Arc::new(hook));
    }

    /// Remove the setter hook, restoring plain value semantics.
    pub fn clear_setter(&self) {
        *self.inner.setter.write() = None;
    }

    /// The notification policy in effect.
    pub fn change_policy(&self) -> ChangePolicy {
        if self.inner.equals.read().is_some() {
            ChangePolicy::SkipUnchanged
        } else {
            ChangePolicy::Always
        }
    }

    /// Notify on every `set` (the default).
    pub fn notify_always(self) -> Self {
        *self.inner.equals.write() = None;
        self
    }

    /// Whether the editor may set this property.
    pub fn is_editable(&self) -> bool {
        self.inner.editable.load(Ordering::SeqCst)
    }

    /// Change editor settability.
    pub fn set_editable(&self, editable: bool) {
        self.inner.editable.store(editable, Ordering::SeqCst);
    }

    /// Whether every write is currently rejected.
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }

    /// Reject all writes, including binding write-backs.
    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::SeqCst);
    }

    /// Accept writes again.
    pub fn unlock(&self) {
        self.inner.locked.store(false, Ordering::SeqCst);
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// Whether two handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Property<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Skip notification when a `set` leaves the value unchanged.
    pub fn skip_unchanged(self) -> Self {
        *self.inner.equals.write() = Some(<T as PartialEq>::eq);
        self
    }
}

impl<T> Source for Property<T>
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
        Property::observer_count(self)
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }
}

impl<T> Default for Property<T>
where
    T: Clone + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Property<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id())
            .field("value", &*self.inner.value.read())
            .field("editable", &self.is_editable())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
