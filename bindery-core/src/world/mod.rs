//! The World
//!
//! The world owns the entity arena, the catalog, and the tick scheduler.
//!
//! # How the Arena Works
//!
//! Entity ids are `slotmap` keys. Reserving an id happens before a factory
//! runs; the entity only becomes visible (to [`World::entity`], to handles,
//! and to the scheduler) once every factory phase has succeeded. A failed
//! build releases the id again, so nothing half-built is ever registered.
//!
//! ```text
//! keys:  SlotMap<EntityId, EntityMeta>        reserved ids + type names
//! live:  SecondaryMap<EntityId, Arc<Entity>>  fully built entities
//! order: Vec<EntityId>                        registration order
//! ```
//!
//! # Threading
//!
//! `World` is `Send + Sync`, but propagation is synchronous. The depth bound
//! from [`RuntimeSettings`] is applied to the calling thread for the duration
//! of each [`World::tick`], [`World::instantiate`] and [`World::restore`], and
//! the thread's previous bound is restored afterwards. Two worlds with
//! different bounds therefore never override each other.

mod layout;
mod scheduler;

pub use layout::{EntityMeta, WorldLayout};
pub use scheduler::{NeverSuspend, SuspendPolicy, TickStats, UpdateScheduler};

use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, info, warn};

use crate::config::{Catalog, Config, RuntimeSettings};
use crate::entity::{Entity, EntityId};
use crate::error::{BindError, Result};
use crate::factory::{Factory, FactoryContext, FactoryRegistry, Mode};
use crate::reactive::PropagationScope;

/// What [`World::restore_with`] does when one entity fails to rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Stop and return the error.
    #[default]
    Abort,
    /// Drop the entity and keep loading.
    Skip,
}

/// A world rebuilt by [`World::restore_with`].
#[derive(Debug)]
pub struct Restored {
    pub world: World,
    /// Entities that failed to rebuild, with their errors.
    pub skipped: Vec<(EntityId, BindError)>,
}

#[derive(Default)]
struct Arena {
    keys: SlotMap<EntityId, EntityMeta>,
    live: SecondaryMap<EntityId, Arc<Entity>>,
    order: Vec<EntityId>,
}

/// Container for every entity in a simulation.
pub struct World {
    arena: RwLock<Arena>,
    catalog: Catalog,
    settings: RuntimeSettings,
    scheduler: UpdateScheduler,
}

impl World {
    pub fn new(config: Config) -> Self {
        Self {
            arena: RwLock::new(Arena::default()),
            catalog: Catalog::new(config.catalog),
            settings: config.runtime,
            scheduler: UpdateScheduler::new(),
        }
    }

    /// Replace the suspension policy consulted at the start of every tick.
    pub fn with_policy(mut self, policy: impl SuspendPolicy + 'static) -> Self {
        let tick = self.scheduler.tick_count();
        self.scheduler = UpdateScheduler::with_policy(policy);
        self.scheduler.set_tick_count(tick);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn tick_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    // ---- Arena ----

    pub(crate) fn reserve(&self, type_name: &str) -> EntityId {
        self.arena.write().keys.insert(EntityMeta {
            type_name: type_name.to_string(),
        })
    }

    pub(crate) fn release(&self, id: EntityId) {
        let mut arena = self.arena.write();
        arena.keys.remove(id);
        arena.live.remove(id);
        arena.order.retain(|&other| other != id);
    }

    fn register(&self, entity: Arc<Entity>) {
        let mut arena = self.arena.write();
        let id = entity.id();
        if arena.live.insert(id, entity).is_none() {
            arena.order.push(id);
        }
    }

    /// Create and register a bare entity with no factory behind it.
    pub fn spawn(&self, type_name: &str) -> Arc<Entity> {
        let id = self.reserve(type_name);
        let entity = Arc::new(Entity::new(id, type_name));
        self.register(entity.clone());
        debug!(entity = ?id, type_name, "entity spawned");
        entity
    }

    /// Look up a registered entity. Deleted entities are returned until the
    /// next sweep; use [`Handle::target`](crate::entity::Handle::target) to
    /// filter them out.
    pub fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.arena.read().live.get(id).cloned()
    }

    /// Registered entities in registration order.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        let arena = self.arena.read();
        arena
            .order
            .iter()
            .filter_map(|&id| arena.live.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete an entity and free its id immediately.
    pub fn delete(&self, id: EntityId) -> Result<()> {
        let entity = self.entity(id).ok_or(BindError::EntityNotFound(id))?;
        entity.delete();
        self.release(id);
        Ok(())
    }

    /// Free the ids of every deleted entity. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut arena = self.arena.write();
        let dead: Vec<EntityId> = arena
            .live
            .iter()
            .filter(|(_, entity)| entity.is_deleted())
            .map(|(id, _)| id)
            .collect();
        for &id in &dead {
            arena.keys.remove(id);
            arena.live.remove(id);
        }
        if !dead.is_empty() {
            arena.order.retain(|id| !dead.contains(id));
        }
        dead.len()
    }

    // ---- Scheduling ----

    /// Advance the simulation by one tick of `dt` seconds.
    pub fn tick(&self, dt: f32) -> Result<TickStats> {
        let _limit = PropagationScope::limit(self.settings.max_propagation_depth);
        self.scheduler.run(self, dt)
    }

    // ---- Factories ----

    /// Build a new entity with `factory`.
    ///
    /// Runs Create, then Bind with `creating = true`, then (in editor mode)
    /// AttachEditorComponents. The entity is registered only if all phases
    /// succeed; otherwise it is deleted and its id released.
    pub fn instantiate(&self, factory: &dyn Factory, mode: Mode) -> Result<Arc<Entity>> {
        let id = self.reserve(factory.type_name());
        self.build(factory, id, mode, true).inspect_err(|_| self.release(id))
    }

    /// [`instantiate`](Self::instantiate) by type name.
    pub fn instantiate_by_name(
        &self,
        registry: &FactoryRegistry,
        type_name: &str,
        mode: Mode,
    ) -> Result<Arc<Entity>> {
        let factory = registry.get(type_name)?;
        self.instantiate(factory.as_ref(), mode)
    }

    fn build(&self, factory: &dyn Factory, id: EntityId, mode: Mode, creating: bool) -> Result<Arc<Entity>> {
        let _limit = PropagationScope::limit(self.settings.max_propagation_depth);
        let ctx = FactoryContext::new(self, id, factory.type_name(), mode);

        let entity = match factory.create(&ctx) {
            Ok(entity) => Arc::new(entity),
            Err(err) => {
                warn!(type_name = factory.type_name(), error = %err, "create failed");
                return Err(err);
            }
        };

        let phases = factory.bind(&entity, &ctx, creating).and_then(|()| {
            if mode == Mode::Editor {
                factory.attach_editor_components(&entity, &ctx)
            } else {
                Ok(())
            }
        });
        if let Err(err) = phases {
            warn!(
                entity = ?id,
                type_name = factory.type_name(),
                creating,
                error = %err,
                "factory failed; entity discarded"
            );
            entity.delete();
            return Err(err);
        }

        self.register(entity.clone());
        debug!(entity = ?id, type_name = factory.type_name(), ?mode, creating, "entity built");
        Ok(entity)
    }

    // ---- Persistence ----

    /// Snapshot the ids and type names of every live entity.
    pub fn layout(&self) -> WorldLayout {
        let arena = self.arena.read();
        let mut keys = arena.keys.clone();
        keys.retain(|id, _| arena.live.get(id).is_some_and(|e| !e.is_deleted()));
        let order = arena
            .order
            .iter()
            .copied()
            .filter(|&id| keys.contains_key(id))
            .collect();

        WorldLayout {
            tick: self.tick_count(),
            keys,
            order,
        }
    }

    pub fn save_layout(&self) -> Result<Vec<u8>> {
        self.layout().to_bytes()
    }

    /// Rebuild a world from a saved layout.
    ///
    /// Every entity is recreated at its saved id by the factory registered
    /// for its type and bound with `creating = false`. Editor components are
    /// attached in editor mode. The first entity that fails aborts the load.
    pub fn restore(
        config: Config,
        layout: &WorldLayout,
        registry: &FactoryRegistry,
        mode: Mode,
    ) -> Result<World> {
        let restored = Self::restore_with(config, layout, registry, mode, RestorePolicy::Abort)?;
        Ok(restored.world)
    }

    /// [`restore`](Self::restore) with a choice of what to do when an entity
    /// fails to rebuild.
    ///
    /// Under [`RestorePolicy::Skip`] the failed entity's id is released and
    /// the error is collected in [`Restored::skipped`].
    pub fn restore_with(
        config: Config,
        layout: &WorldLayout,
        registry: &FactoryRegistry,
        mode: Mode,
        policy: RestorePolicy,
    ) -> Result<Restored> {
        let world = World::new(config);
        {
            let mut arena = world.arena.write();
            arena.keys = layout.keys.clone();
        }
        world.scheduler.set_tick_count(layout.tick);

        let mut skipped = Vec::new();
        for (id, meta) in layout.entities() {
            let built = registry
                .get(&meta.type_name)
                .and_then(|factory| world.build(factory.as_ref(), id, mode, false));
            match (built, policy) {
                (Ok(_), _) => {}
                (Err(err), RestorePolicy::Abort) => return Err(err),
                (Err(err), RestorePolicy::Skip) => {
                    warn!(entity = ?id, type_name = %meta.type_name, error = %err, "entity skipped");
                    world.release(id);
                    skipped.push((id, err));
                }
            }
        }

        info!(
            entities = world.len(),
            skipped = skipped.len(),
            tick = layout.tick,
            ?mode,
            "world restored"
        );
        Ok(Restored { world, skipped })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.len())
            .field("tick", &self.tick_count())
            .field("catalog", &self.catalog.len())
            .finish()
    }
}
