//! Per-tick callbacks owned by an entity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::Entity;
use crate::error::Result;
use crate::world::World;

static NEXT_UPDATER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registered updater, for [`Entity::remove_updater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdaterId(u64);

impl UpdaterId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UPDATER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What an updater sees during a tick.
pub struct UpdateContext<'a> {
    /// Seconds elapsed since the previous tick.
    pub dt: f32,
    /// Index of the tick being run, starting at 1.
    pub tick: u64,
    /// The entity that owns the updater.
    pub entity: &'a Arc<Entity>,
    /// The world being ticked.
    pub world: &'a World,
}

impl fmt::Debug for UpdateContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateContext")
            .field("dt", &self.dt)
            .field("tick", &self.tick)
            .field("entity", &self.entity.id())
            .finish()
    }
}

pub(crate) type UpdateFn = Box<dyn FnMut(&UpdateContext<'_>) -> Result<()> + Send>;

/// A registered updater. The callback sits behind its own lock so the
/// entity's updater list can be snapshotted and released before anything runs.
#[derive(Clone)]
pub(crate) struct Updater {
    pub(crate) id: UpdaterId,
    pub(crate) owner: Option<String>,
    callback: Arc<Mutex<UpdateFn>>,
}

impl Updater {
    pub(crate) fn new(owner: Option<String>, callback: UpdateFn) -> Self {
        Self {
            id: UpdaterId::next(),
            owner,
            callback: Arc::new(Mutex::new(callback)),
        }
    }

    /// Run the callback. A callback that is already running further up the
    /// stack is skipped.
    pub(crate) fn run(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        match self.callback.try_lock() {
            Some(mut callback) => (*callback)(ctx),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}
