//! Entities
//!
//! An entity is a named bag of components plus the edges and updaters that
//! wire them together. It is the unit of ownership: everything registered on
//! an entity is torn down when the entity is deleted, and everything
//! registered under a component's name is torn down when that component is
//! removed.
//!
//! # How Ownership Works
//!
//! ```text
//! Entity
//!   ├── components   IndexMap<name, Arc<dyn Component>>   (insertion order)
//!   ├── edges        Vec<(owner, Box<dyn Edge>)>          (detached on teardown)
//!   └── updaters     Vec<(owner, Updater)>                (run by World::tick)
//! ```
//!
//! Other entities never hold an `Arc<Entity>` across ticks. They hold a
//! [`Handle`], which stops resolving as soon as the entity is deleted.

mod component;
mod handle;
mod updater;

pub use component::{AsAny, Component};
pub use handle::{EntityId, Handle};
pub use updater::{UpdateContext, UpdaterId};
pub(crate) use updater::Updater;

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::binding::Edge;
use crate::error::{BindError, Result};
use crate::reactive::{EditorProperty, Property};

struct ComponentSlot {
    component: Arc<dyn Component>,
    type_name: &'static str,
    serialize: bool,
}

struct OwnedEdge {
    owner: Option<String>,
    edge: Box<dyn Edge>,
}

/// A dynamically composed game object.
///
/// Entities are created through [`World::spawn`](crate::world::World::spawn)
/// or a [`Factory`](crate::factory::Factory) and shared as `Arc<Entity>`.
/// All methods take `&self`.
pub struct Entity {
    id: EntityId,
    type_name: String,
    active: AtomicBool,
    suspended: AtomicBool,
    cannot_suspend: AtomicBool,
    deleted: AtomicBool,
    editor_selected: Property<bool>,
    components: RwLock<IndexMap<String, ComponentSlot>>,
    edges: Mutex<Vec<OwnedEdge>>,
    updaters: Mutex<Vec<Updater>>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            active: AtomicBool::new(true),
            suspended: AtomicBool::new(false),
            cannot_suspend: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            editor_selected: Property::new(false),
            components: RwLock::new(IndexMap::new()),
            edges: Mutex::new(Vec::new()),
            updaters: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The factory type this entity was built by.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// A weak handle to this entity.
    pub fn handle(self: &Arc<Self>) -> Handle {
        Handle::from(self)
    }

    // ---- Components ----

    /// Attach `component` under `name`.
    ///
    /// Fails with [`BindError::DuplicateComponent`] if the name is taken.
    pub fn add<C: Component>(&self, name: impl Into<String>, component: C) -> Result<Arc<C>> {
        self.insert(name.into(), Arc::new(component), true)
    }

    /// Attach an editor-only decoration. It is never part of
    /// [`serializable_component_names`](Self::serializable_component_names).
    pub fn add_editor_component<C: Component>(
        &self,
        name: impl Into<String>,
        component: C,
    ) -> Result<Arc<C>> {
        self.insert(name.into(), Arc::new(component), false)
    }

    fn insert<C: Component>(&self, name: String, component: Arc<C>, serialize: bool) -> Result<Arc<C>> {
        let mut components = self.components.write();
        if components.contains_key(&name) {
            return Err(BindError::DuplicateComponent {
                entity: self.describe(),
                name,
            });
        }
        components.insert(
            name,
            ComponentSlot {
                component: component.clone(),
                type_name: type_name::<C>(),
                serialize,
            },
        );
        Ok(component)
    }

    /// Look up the component stored under `name`.
    pub fn get<C: Component>(&self, name: &str) -> Result<Arc<C>> {
        let (stored, actual) = self.slot(name)?;
        component::downcast::<C>(stored).ok_or_else(|| BindError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<C>(),
            actual,
        })
    }

    /// Like [`get`](Self::get), but absorbs both failure kinds into `None`.
    pub fn try_get<C: Component>(&self, name: &str) -> Option<Arc<C>> {
        self.get(name).ok()
    }

    /// The first component of type `C`, in insertion order.
    pub fn find<C: Component>(&self) -> Option<Arc<C>> {
        let components = self.components.read();
        components
            .values()
            .find_map(|slot| component::downcast::<C>(slot.component.clone()))
    }

    /// Return the component under `name`, creating a default one if absent.
    ///
    /// Calling this twice with the same name yields the same instance.
    pub fn get_or_create<C: Component + Default>(&self, name: &str) -> Result<Arc<C>> {
        self.get_or_insert_with(name, C::default)
    }

    pub fn get_or_insert_with<C, F>(&self, name: &str, make: F) -> Result<Arc<C>>
    where
        C: Component,
        F: FnOnce() -> C,
    {
        if self.has(name) {
            return self.get(name);
        }

        // `make` may touch this entity, so it runs without the lock held.
        let component = Arc::new(make());
        let mut components = self.components.write();
        if let Some(slot) = components.get(name) {
            return component::downcast::<C>(slot.component.clone()).ok_or_else(|| {
                BindError::TypeMismatch {
                    name: name.to_string(),
                    expected: type_name::<C>(),
                    actual: slot.type_name,
                }
            });
        }
        components.insert(
            name.to_string(),
            ComponentSlot {
                component: component.clone(),
                type_name: type_name::<C>(),
                serialize: true,
            },
        );
        Ok(component)
    }

    /// A handle to the property stored under `name`.
    ///
    /// Editor properties resolve to their underlying cell.
    pub fn get_property<T>(&self, name: &str) -> Result<Property<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (stored, actual) = self.slot(name)?;
        if let Some(property) = component::downcast::<Property<T>>(stored.clone()) {
            return Ok((*property).clone());
        }
        if let Some(editor) = component::downcast::<EditorProperty<T>>(stored) {
            return Ok(editor.property().clone());
        }
        Err(BindError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<Property<T>>(),
            actual,
        })
    }

    /// Detach and return the component under `name`, tearing down every edge
    /// and updater registered under that name and calling
    /// [`Component::detach`] on it.
    pub fn remove(&self, name: &str) -> Result<Arc<dyn Component>> {
        let slot = self
            .components
            .write()
            .shift_remove(name)
            .ok_or_else(|| self.not_found(name))?;

        let owned: Vec<OwnedEdge> = {
            let mut edges = self.edges.lock();
            let (owned, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *edges)
                .into_iter()
                .partition(|e| e.owner.as_deref() == Some(name));
            *edges = kept;
            owned
        };
        self.updaters
            .lock()
            .retain(|u| u.owner.as_deref() != Some(name));

        for owned in &owned {
            owned.edge.detach();
        }
        slot.component.detach();
        debug!(
            entity = ?self.id,
            component = name,
            edges = owned.len(),
            "component removed"
        );
        Ok(slot.component)
    }

    pub fn has(&self, name: &str) -> bool {
        self.components.read().contains_key(name)
    }

    /// Component names in insertion order.
    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    /// Names of components that belong to persisted state, in insertion order.
    pub fn serializable_component_names(&self) -> Vec<String> {
        self.components
            .read()
            .iter()
            .filter(|(_, slot)| slot.serialize && slot.component.serialize())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn component_count(&self) -> usize {
        self.components.read().len()
    }

    fn slot(&self, name: &str) -> Result<(Arc<dyn Component>, &'static str)> {
        self.components
            .read()
            .get(name)
            .map(|slot| (slot.component.clone(), slot.type_name))
            .ok_or_else(|| self.not_found(name))
    }

    fn not_found(&self, name: &str) -> BindError {
        BindError::ComponentNotFound {
            entity: self.describe(),
            name: name.to_string(),
        }
    }

    fn describe(&self) -> String {
        format!("{}{:?}", self.type_name, self.id)
    }

    // ---- Edges and updaters ----

    /// Keep `edge` alive for the entity's lifetime.
    ///
    /// Registering on a deleted entity detaches the edge immediately.
    pub fn add_binding<E: Edge + 'static>(&self, edge: E) {
        self.push_edge(None, Box::new(edge));
    }

    /// Keep `edge` alive until the component `owner` is removed.
    pub fn add_binding_to<E: Edge + 'static>(&self, owner: &str, edge: E) -> Result<()> {
        if !self.has(owner) {
            edge.detach();
            return Err(self.not_found(owner));
        }
        self.push_edge(Some(owner.to_string()), Box::new(edge));
        Ok(())
    }

    fn push_edge(&self, owner: Option<String>, edge: Box<dyn Edge>) {
        if self.is_deleted() {
            edge.detach();
            return;
        }
        self.edges.lock().push(OwnedEdge { owner, edge });
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().len()
    }

    /// Register a per-tick callback. Updaters run in registration order.
    ///
    /// An updater registered during a tick first runs on the next one.
    pub fn add_updater<F>(&self, update: F) -> UpdaterId
    where
        F: FnMut(&UpdateContext<'_>) -> Result<()> + Send + 'static,
    {
        self.push_updater(None, Box::new(update))
    }

    /// Register a per-tick callback that is dropped with the component `owner`.
    pub fn add_updater_to<F>(&self, owner: &str, update: F) -> Result<UpdaterId>
    where
        F: FnMut(&UpdateContext<'_>) -> Result<()> + Send + 'static,
    {
        if !self.has(owner) {
            return Err(self.not_found(owner));
        }
        Ok(self.push_updater(Some(owner.to_string()), Box::new(update)))
    }

    fn push_updater(&self, owner: Option<String>, update: updater::UpdateFn) -> UpdaterId {
        let updater = Updater::new(owner, update);
        let id = updater.id;
        if !self.is_deleted() {
            self.updaters.lock().push(updater);
        }
        id
    }

    /// Unregister an updater. Returns false if it was not registered.
    pub fn remove_updater(&self, id: UpdaterId) -> bool {
        let mut updaters = self.updaters.lock();
        let before = updaters.len();
        updaters.retain(|u| u.id != id);
        updaters.len() != before
    }

    pub fn updater_count(&self) -> usize {
        self.updaters.lock().len()
    }

    /// Run every updater once, in registration order.
    ///
    /// Stops early if an updater deletes the entity or returns an error.
    pub(crate) fn run_updaters(&self, ctx: &UpdateContext<'_>) -> Result<usize> {
        let snapshot: Vec<Updater> = self.updaters.lock().clone();
        let mut ran = 0;

        for updater in &snapshot {
            if self.is_deleted() {
                break;
            }
            let still_registered = self.updaters.lock().iter().any(|u| u.id == updater.id);
            if !still_registered {
                continue;
            }
            updater.run(ctx)?;
            ran += 1;
        }
        Ok(ran)
    }

    // ---- Lifecycle ----

    /// Delete the entity.
    ///
    /// Marks it inactive, detaches every edge (including those owned by the
    /// components themselves), drops every updater and component, and makes
    /// every [`Handle`] to it stop resolving. Deleting twice is a no-op.
    pub fn delete(&self) {
        if self.deleted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);

        let edges = std::mem::take(&mut *self.edges.lock());
        let updaters = std::mem::take(&mut *self.updaters.lock());
        let components = std::mem::take(&mut *self.components.write());

        for owned in &edges {
            owned.edge.detach();
        }
        for slot in components.values() {
            slot.component.detach();
        }
        debug!(
            entity = ?self.id,
            type_name = %self.type_name,
            edges = edges.len(),
            updaters = updaters.len(),
            components = components.len(),
            "entity deleted"
        );
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Active and not deleted.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.is_deleted()
    }

    /// Deactivate or reactivate the entity. Has no effect once deleted.
    pub fn set_active(&self, active: bool) {
        if !self.is_deleted() {
            self.active.store(active, Ordering::SeqCst);
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn cannot_suspend(&self) -> bool {
        self.cannot_suspend.load(Ordering::SeqCst)
    }

    /// Keep ticking even while suspended.
    pub fn set_cannot_suspend(&self, cannot_suspend: bool) {
        self.cannot_suspend.store(cannot_suspend, Ordering::SeqCst);
    }

    /// Whether the scheduler should run this entity's updaters.
    pub fn should_update(&self) -> bool {
        self.is_active() && (!self.is_suspended() || self.cannot_suspend())
    }

    /// Set by the editor while the entity is selected.
    pub fn editor_selected(&self) -> &Property<bool> {
        &self.editor_selected
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("active", &self.is_active())
            .field("deleted", &self.is_deleted())
            .field("components", &self.component_names())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
