//! Update Scheduler
//!
//! The scheduler runs entity updaters once per tick.
//!
//! # Algorithm
//!
//! 1. Ask the [`SuspendPolicy`] whether each active entity is suspended
//! 2. Walk entities in registration order, skipping deleted, inactive, and
//!    suspended ones (unless they are marked `cannot_suspend`)
//! 3. Run each entity's updaters in registration order
//! 4. Sweep deleted entities out of the arena
//!
//! Deletions and property writes made by an updater are visible to every
//! updater that runs after it in the same tick. The first failing updater
//! aborts the tick.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::World;
use crate::entity::{Entity, UpdateContext};
use crate::error::{BindError, Result};

/// Decides whether an entity is suspended, e.g. because it is off screen.
pub trait SuspendPolicy: Send + Sync {
    fn should_suspend(&self, entity: &Entity) -> bool;
}

/// Policy that never suspends anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSuspend;

impl SuspendPolicy for NeverSuspend {
    fn should_suspend(&self, _entity: &Entity) -> bool {
        false
    }
}

impl<F> SuspendPolicy for F
where
    F: Fn(&Entity) -> bool + Send + Sync,
{
    fn should_suspend(&self, entity: &Entity) -> bool {
        self(entity)
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    /// Entities whose updaters ran.
    pub updated: usize,
    /// Entities skipped as inactive or suspended.
    pub skipped: usize,
    /// Deleted entities removed from the arena afterwards.
    pub swept: usize,
}

/// Per-world tick driver.
pub struct UpdateScheduler {
    tick: AtomicU64,
    policy: Box<dyn SuspendPolicy>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::with_policy(NeverSuspend)
    }

    pub fn with_policy(policy: impl SuspendPolicy + 'static) -> Self {
        Self {
            tick: AtomicU64::new(0),
            policy: Box::new(policy),
        }
    }

    /// Number of ticks started so far.
    pub fn tick_count(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub(crate) fn set_tick_count(&self, tick: u64) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    pub(crate) fn run(&self, world: &World, dt: f32) -> Result<TickStats> {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst) + 1;
        let entities = world.entities();
        let mut stats = TickStats {
            tick,
            ..TickStats::default()
        };

        for entity in &entities {
            if entity.is_active() {
                entity.set_suspended(self.policy.should_suspend(entity));
            }
        }

        for entity in &entities {
            if !entity.should_update() {
                stats.skipped += 1;
                continue;
            }
            let ctx = UpdateContext {
                dt,
                tick,
                entity,
                world,
            };
            entity.run_updaters(&ctx).map_err(|source| BindError::Tick {
                entity: format!("{}{:?}", entity.type_name(), entity.id()),
                tick,
                source: Box::new(source),
            })?;
            stats.updated += 1;
        }

        if world.settings().sweep_deleted {
            stats.swept = world.sweep();
        }

        trace!(
            tick,
            updated = stats.updated,
            skipped = stats.skipped,
            swept = stats.swept,
            "tick complete"
        );
        Ok(stats)
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("tick", &self.tick_count())
            .finish()
    }
}
