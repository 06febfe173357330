//! Entity identity and weak handles.
//!
//! An [`EntityId`] is an index/generation pair into the world's entity arena.
//! Freeing a slot bumps its generation, so an id that outlives its entity can
//! never resolve to whatever reuses the slot.
//!
//! A [`Handle`] wraps an id with a cached, non-owning lookup. It is what one
//! entity stores when it needs to refer to another without owning it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slotmap::Key;

use super::Entity;
use crate::world::World;

slotmap::new_key_type! {
    /// Stable identity of an entity: arena index plus generation.
    pub struct EntityId;
}

/// A weak, serializable reference to an entity.
///
/// Handles compare, hash and serialize by id only; the cached lookup is
/// rebuilt on demand after deserialization. A handle never keeps its target
/// alive.
///
/// # Example
///
/// ```rust,ignore
/// let target_map: Property<Handle> = entity.get_property("TargetMap")?;
/// match target_map.get().target(ctx.world) {
///     Some(map) => { /* use the map */ }
///     None => ctx.entity.delete(),
/// }
/// ```
#[derive(Default)]
pub struct Handle {
    id: EntityId,
    cache: Mutex<Weak<Entity>>,
}

impl Handle {
    /// A handle that never resolves.
    pub fn null() -> Self {
        Self::default()
    }

    /// A handle to an entity that has not been resolved yet.
    pub fn from_id(id: EntityId) -> Self {
        Self {
            id,
            cache: Mutex::new(Weak::new()),
        }
    }

    /// The referenced entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_null(&self) -> bool {
        self.id.is_null()
    }

    /// Resolve the handle.
    ///
    /// Returns `None` if the handle is null, or the entity has been deleted,
    /// deactivated, or is unknown to `world`.
    pub fn target(&self, world: &World) -> Option<Arc<Entity>> {
        if self.is_null() {
            return None;
        }

        let cached = self.cache.lock().upgrade();
        let entity = match cached {
            Some(entity) => entity,
            None => {
                let entity = world.entity(self.id)?;
                *self.cache.lock() = Arc::downgrade(&entity);
                entity
            }
        };

        entity.is_active().then_some(entity)
    }

    /// True only if the handle resolves to a live, active entity.
    pub fn active(&self, world: &World) -> bool {
        self.target(world).is_some()
    }
}

impl From<&Arc<Entity>> for Handle {
    fn from(entity: &Arc<Entity>) -> Self {
        Self {
            id: entity.id(),
            cache: Mutex::new(Arc::downgrade(entity)),
        }
    }
}

impl From<EntityId> for Handle {
    fn from(id: EntityId) -> Self {
        Self::from_id(id)
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cache: Mutex::new(self.cache.lock().clone()),
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EntityId::deserialize(deserializer).map(Self::from_id)
    }
}
