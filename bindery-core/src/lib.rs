//! Bindery Core
//!
//! This crate provides the reactive property and entity composition runtime
//! for real-time simulations. It implements:
//!
//! - Reactive cells (properties, editor properties, lists)
//! - Explicit binding edges (one-way, two-way, notify, list)
//! - Entities built from named components, with weak handles
//! - Per-tick updater scheduling
//! - A three-phase factory protocol and layout persistence
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Cells and the synchronous propagation stack
//! - `binding`: Edges that keep cells consistent with each other
//! - `entity`: Components, entities, handles and updaters
//! - `world`: The entity arena, tick scheduler and saved layouts
//! - `factory`: The Create / Bind / AttachEditorComponents protocol
//! - `config`: Runtime settings and the static catalog
//!
//! # Example
//!
//! ```rust
//! use bindery_core::prelude::*;
//!
//! let celsius = Property::new(20.0_f64);
//! let fahrenheit = Property::new(0.0_f64);
//!
//! // Derived state stays in sync without any manual update code.
//! let _binding = Binding::map(&fahrenheit, &celsius, |c| c * 9.0 / 5.0 + 32.0)?;
//! assert_eq!(fahrenheit.get(), 68.0);
//!
//! celsius.set(100.0)?;
//! assert_eq!(fahrenheit.get(), 212.0);
//! # Ok::<(), bindery_core::BindError>(())
//! ```

pub mod binding;
pub mod config;
pub mod entity;
pub mod error;
pub mod factory;
pub mod reactive;
pub mod world;

pub use error::{BindError, Result};

/// Everything a factory or updater usually needs.
pub mod prelude {
    pub use crate::binding::{Binding, Edge, ListBinding, NotifyBinding, TwoWayBinding};
    pub use crate::config::{Catalog, CatalogEntry, Config, RuntimeSettings};
    pub use crate::entity::{Component, Entity, EntityId, Handle, UpdateContext, UpdaterId};
    pub use crate::error::{BindError, Result};
    pub use crate::factory::{Factory, FactoryContext, FactoryRegistry, Mode};
    pub use crate::reactive::{
        ChangePolicy, EditorProperty, ListEvent, ListProperty, Property, Source,
    };
    pub use crate::world::{Restored, RestorePolicy, SuspendPolicy, TickStats, World, WorldLayout};
}
