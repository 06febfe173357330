//! Persisted world layout.
//!
//! A layout records which entities exist, under which ids, and which factory
//! built each one. It does not record component values. Restoring a layout
//! recreates every entity at its saved id, so any [`Handle`](crate::entity::Handle)
//! serialized alongside it resolves again.
//!
//! # Wire Format
//!
//! MessagePack via `rmp-serde`, with named fields so layouts survive field
//! reordering.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::entity::EntityId;
use crate::error::Result;

/// Arena metadata kept for every reserved entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub type_name: String,
}

/// Snapshot of the entity arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldLayout {
    pub(crate) tick: u64,
    pub(crate) keys: SlotMap<EntityId, EntityMeta>,
    pub(crate) order: Vec<EntityId>,
}

impl WorldLayout {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// The tick counter at the time the layout was taken.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &EntityMeta)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.keys.get(id).map(|meta| (id, meta)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
