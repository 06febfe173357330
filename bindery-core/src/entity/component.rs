//! Component trait and type-erased storage helpers.

use std::any::Any;
use std::sync::Arc;

use crate::reactive::{EditorProperty, ListProperty, Property};

/// Upcast to `Any` so type-erased components can be downcast again.
pub trait AsAny: Any + Send + Sync {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The unit an [`Entity`](super::Entity) is built from.
///
/// Any `Send + Sync + 'static` type can be a component; the trait only adds
/// optional metadata. Properties and lists are components too, which is how
/// factories attach bare fields such as `"Lifetime"` to an entity.
pub trait Component: AsAny {
    /// Whether the component is part of persisted runtime state.
    fn serialize(&self) -> bool {
        true
    }

    /// Tear down edges the component owns itself.
    ///
    /// Called when the component is removed or its entity is deleted. Other
    /// `Arc`s to the component may outlive the entity, so edges held in
    /// fields must be detached here rather than left to `Drop`.
    fn detach(&self) {}
}

impl<T> Component for Property<T> where T: Clone + Send + Sync + 'static {}

impl<T> Component for EditorProperty<T> where T: Clone + Send + Sync + 'static {}

impl<T> Component for ListProperty<T> where T: Clone + Send + Sync + 'static {}

/// Downcast a stored component to its concrete type.
pub(crate) fn downcast<C: Component>(component: Arc<dyn Component>) -> Option<Arc<C>> {
    component.as_any_arc().downcast::<C>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;
    impl Component for Marker {
        fn serialize(&self) -> bool {
            false
        }
    }

    #[test]
    fn downcast_round_trips_through_dyn_component() {
        let stored: Arc<dyn Component> = Arc::new(Property::new(3_u8));
        let property = downcast::<Property<u8>>(stored.clone()).unwrap();
        assert_eq!(property.get(), 3);

        assert!(downcast::<Property<i64>>(stored.clone()).is_none());
        assert!(stored.serialize());
    }

    #[test]
    fn components_can_opt_out_of_serialization() {
        let stored: Arc<dyn Component> = Arc::new(Marker);
        assert!(!stored.serialize());
        assert!(downcast::<Marker>(stored).is_some());
    }
}
