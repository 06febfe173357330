//! Reactive Primitives
//!
//! This module implements the reactive cells that every component is built
//! from: value properties and ordered list properties.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A [`Property`] is a container for mutable state. Unlike a tracking signal
//! system, reading a property never subscribes anything. Observers are only
//! ever the edges explicitly attached to it by a binding, so the dependency
//! graph is exactly the set of bindings the factories wired up.
//!
//! ## Lists
//!
//! A [`ListProperty`] is an ordered sequence that reports structural edits
//! (insert at, remove at, clear) instead of whole-value replacement.
//!
//! ## Propagation
//!
//! Changes propagate synchronously and depth-first. [`PropagationScope`]
//! records the active chain so the depth can be bounded.

mod editor;
mod list;
mod observer;
mod propagation;
mod property;

pub use editor::EditorProperty;
pub use list::{ListEvent, ListObserver, ListProperty};
pub use observer::{CellId, Observer, ObserverId, Source};
pub use propagation::{DepthLimit, PropagationScope, DEFAULT_MAX_DEPTH};
pub use property::{ChangePolicy, Property, Setter};
