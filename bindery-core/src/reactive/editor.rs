//! Editor-facing properties.

use std::ops::Deref;

use super::property::Property;
use crate::error::Result;

/// A [`Property`] that also carries its default value and how the editor
/// should present it.
///
/// At runtime it behaves exactly like the wrapped property; it derefs to it.
pub struct EditorProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    property: Property<T>,
    default: T,
    label: Option<String>,
    visible: bool,
}

impl<T> EditorProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an editor property whose current and default value are `value`.
    pub fn new(value: T) -> Self {
        Self {
            property: Property::new(value.clone()),
            default: value,
            label: None,
            visible: true,
        }
    }

    /// Attach a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Hide the property from the editor's inspector.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Restore the default value, notifying observers.
    pub fn reset(&self) -> Result<()> {
        self.property.set(self.default.clone())
    }

    /// The underlying cell.
    pub fn property(&self) -> &Property<T> {
        &self.property
    }
}

impl<T> Deref for EditorProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Target = Property<T>;

    fn deref(&self) -> &Property<T> {
        &self.property
    }
}

impl<T> Default for EditorProperty<T>
where
    T: Clone + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for EditorProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            property: self.property.clone(),
            default: self.default.clone(),
            label: self.label.clone(),
            visible: self.visible,
        }
    }
}

impl<T> std::fmt::Debug for EditorProperty<T>
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorProperty")
            .field("value", &self.property.get())
            .field("default", &self.default)
            .field("label", &self.label)
            .field("visible", &self.visible)
            .finish()
    }
}
