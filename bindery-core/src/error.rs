//! Error Types
//!
//! Every fallible operation in the runtime returns [`BindError`]. Errors raised
//! inside a propagation chain unwind the whole chain and surface at the call
//! that started it: a `set`, a factory phase, or a world tick.

use thiserror::Error;

use crate::entity::EntityId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BindError>;

/// Errors produced by cells, bindings, entities and the scheduler.
#[derive(Debug, Error)]
pub enum BindError {
    /// No component is registered under the requested name.
    #[error("component `{name}` not found on entity `{entity}`")]
    ComponentNotFound { entity: String, name: String },

    /// A component exists but is not of the requested type.
    #[error("component `{name}` is a `{actual}`, not a `{expected}`")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A component name was registered twice on the same entity.
    #[error("component `{name}` already exists on entity `{entity}`")]
    DuplicateComponent { entity: String, name: String },

    /// Positional access outside a collection's bounds.
    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A write was attempted on a locked cell, or an editor write on a
    /// non-editable one.
    #[error("invalid propagation into cell {cell}: {reason}")]
    InvalidPropagation { cell: u64, reason: &'static str },

    /// Propagation recursed deeper than the configured bound, which almost
    /// always means a non-converging binding cycle.
    #[error("propagation exceeded the maximum depth of {limit}")]
    PropagationDepthExceeded { limit: usize },

    /// No factory is registered for the requested entity type.
    #[error("no factory registered for entity type `{0}`")]
    UnknownFactory(String),

    /// The entity id does not resolve to a live entity.
    #[error("entity {0:?} does not exist")]
    EntityNotFound(EntityId),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A world layout could not be encoded.
    #[error("failed to encode layout: {0}")]
    LayoutEncode(#[from] rmp_serde::encode::Error),

    /// A world layout could not be decoded.
    #[error("failed to decode layout: {0}")]
    LayoutDecode(#[from] rmp_serde::decode::Error),

    /// An updater failed while the world was ticking.
    #[error("updater on entity `{entity}` failed during tick {tick}")]
    Tick {
        entity: String,
        tick: u64,
        #[source]
        source: Box<BindError>,
    },

    /// An error reported by an external collaborator (grid, audio, ...).
    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl BindError {
    /// Wrap any collaborator error.
    pub fn external<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::External(Box::new(err))
    }

    /// True for the lookup failure that `get_or_create` style helpers absorb.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ComponentNotFound { .. })
    }
}
