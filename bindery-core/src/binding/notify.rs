//! Notify Binding
//!
//! A NotifyBinding runs a callback whenever any of its dependencies changes.
//! It carries no value of its own. Use it to rebuild derived resources that
//! cannot be written as a projection into a single target, for example
//! re-creating another binding whenever a compound key changes.
//!
//! # Differences from Binding
//!
//! - A `Binding` writes a target; a `NotifyBinding` only runs a callback.
//! - A `Binding` runs once on construction; a `NotifyBinding` does **not**.
//!   It fires only on a subsequent change.
//!
//! # Re-entrancy
//!
//! If the callback changes one of its own dependencies, the nested
//! notification is skipped rather than re-entering the callback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::{Attachment, Edge, EdgeKind};
use crate::error::Result;
use crate::reactive::{CellId, Observer, ObserverId, Source};

type Callback = Box<dyn FnMut() -> Result<()> + Send>;

struct Notify {
    attachment: Attachment,
    callback: Mutex<Callback>,
}

impl Observer for Notify {
    fn observer_id(&self) -> ObserverId {
        self.attachment.id()
    }

    fn on_change(&self, _source: CellId) -> Result<()> {
        if !self.attachment.is_attached() {
            return Ok(());
        }
        match self.callback.try_lock() {
            Some(mut callback) => (*callback)(),
            None => {
                trace!(
                    edge = self.attachment.id().raw(),
                    "skipped re-entrant notify callback"
                );
                Ok(())
            }
        }
    }
}

/// A valueless edge that runs a callback on any dependency change.
///
/// # Example
///
/// ```rust,ignore
/// let mut offset: Option<Binding> = None;
/// let rebuild = NotifyBinding::new(
///     move || {
///         let _previous = offset.replace(Binding::new(&parameter(), &entity_offset)?);
///         Ok(())
///     },
///     &[&model.instance_key],
/// );
/// ```
#[derive(Clone)]
pub struct NotifyBinding {
    inner: Arc<Notify>,
}

impl NotifyBinding {
    /// Attach `callback` to every cell in `deps`. Does not run it.
    pub fn new<F>(callback: F, deps: &[&dyn Source]) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let inner = Arc::new(Notify {
            attachment: Attachment::new(EdgeKind::Notify, Attachment::collect(deps)),
            callback: Mutex::new(Box::new(callback)),
        });
        let observer: Weak<dyn Observer> = Arc::downgrade(&inner) as Weak<dyn Observer>;
        inner.attachment.attach(observer);
        Self { inner }
    }
}

impl Edge for NotifyBinding {
    fn id(&self) -> ObserverId {
        self.inner.attachment.id()
    }

    fn kind(&self) -> EdgeKind {
        self.inner.attachment.kind()
    }

    fn detach(&self) {
        self.inner.attachment.detach();
    }

    fn is_attached(&self) -> bool {
        self.inner.attachment.is_attached()
    }
}

impl std::fmt::Debug for NotifyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBinding")
            .field("id", &self.id())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
