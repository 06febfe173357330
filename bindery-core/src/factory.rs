//! Factories
//!
//! A factory assembles one kind of entity in three phases:
//!
//! 1. **Create** allocates the entity and attaches its components.
//! 2. **Bind** wires bindings between components and registers updaters.
//!    It runs again, with `creating = false`, when a saved world is restored.
//! 3. **AttachEditorComponents** adds editor-only decorations. It runs only
//!    in [`Mode::Editor`].
//!
//! Factories never register the entity themselves. [`World::instantiate`]
//! runs the phases and registers the entity only if all of them succeed.
//!
//! # Example
//!
//! ```rust,ignore
//! struct SpotLightFactory;
//!
//! impl Factory for SpotLightFactory {
//!     fn type_name(&self) -> &str {
//!         "SpotLight"
//!     }
//!
//!     fn create(&self, ctx: &FactoryContext<'_>) -> Result<Entity> {
//!         let entity = ctx.new_entity();
//!         entity.add("Transform", Transform::default())?;
//!         entity.add("SpotLight", SpotLight::default())?;
//!         Ok(entity)
//!     }
//!
//!     fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
//!         let transform = entity.get::<Transform>("Transform")?;
//!         let light = entity.get::<SpotLight>("SpotLight")?;
//!         entity.add_binding(TwoWayBinding::new(&light.position, &transform.position)?);
//!         Ok(())
//!     }
//! }
//! ```
//!
//! [`World::instantiate`]: crate::world::World::instantiate

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Catalog;
use crate::entity::{Entity, EntityId};
use crate::error::{BindError, Result};
use crate::world::World;

/// Which set of phases a factory runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Runtime,
    Editor,
}

/// What a factory can see while it builds an entity.
pub struct FactoryContext<'a> {
    world: &'a World,
    id: EntityId,
    type_name: &'a str,
    mode: Mode,
}

impl<'a> FactoryContext<'a> {
    pub(crate) fn new(world: &'a World, id: EntityId, type_name: &'a str, mode: Mode) -> Self {
        Self {
            world,
            id,
            type_name,
            mode,
        }
    }

    pub fn world(&self) -> &'a World {
        self.world
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.world.catalog()
    }

    /// The id reserved for the entity under construction.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_editor(&self) -> bool {
        self.mode == Mode::Editor
    }

    /// An empty entity at the reserved id.
    pub fn new_entity(&self) -> Entity {
        Entity::new(self.id, self.type_name)
    }
}

impl fmt::Debug for FactoryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryContext")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Three-phase construction protocol for one entity type.
pub trait Factory: Send + Sync {
    /// Name recorded on every entity this factory builds.
    fn type_name(&self) -> &str;

    /// RGB tint used for the entity's editor gizmo.
    fn editor_color(&self) -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    /// Allocate the entity and attach its components.
    fn create(&self, ctx: &FactoryContext<'_>) -> Result<Entity> {
        Ok(ctx.new_entity())
    }

    /// Wire bindings and updaters. `creating` is false when the entity is
    /// being rebuilt from a saved layout.
    fn bind(&self, entity: &Arc<Entity>, ctx: &FactoryContext<'_>, creating: bool) -> Result<()>;

    /// Attach editor-only decorations. Only called in [`Mode::Editor`].
    fn attach_editor_components(&self, _entity: &Arc<Entity>, _ctx: &FactoryContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Factories by type name, in registration order.
#[derive(Default, Clone)]
pub struct FactoryRegistry {
    factories: IndexMap<String, Arc<dyn Factory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under its type name, replacing any previous one.
    pub fn register(&mut self, factory: impl Factory + 'static) -> &mut Self {
        let name = factory.type_name().to_string();
        debug!(type_name = %name, "factory registered");
        self.factories.insert(name, Arc::new(factory));
        self
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<dyn Factory>> {
        self.factories
            .get(type_name)
            .cloned()
            .ok_or_else(|| BindError::UnknownFactory(type_name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
