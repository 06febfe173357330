//! One-way Binding
//!
//! A Binding recomputes a target from its sources whenever any source
//! changes. It is the reactive counterpart of a cached derived value, except
//! that it is eager: the target is written as part of the source's `set`,
//! so a chain `a -> b -> c` is fully consistent before `a.set` returns.
//!
//! Construction performs one propagation pass so that a freshly created
//! binding does not need an external nudge.

use std::sync::{Arc, Weak};

use super::{Attachment, Edge, EdgeKind};
use crate::error::Result;
use crate::reactive::{CellId, Observer, ObserverId, Property, Source};

type Run = Box<dyn Fn() -> Result<()> + Send + Sync>;

struct OneWay {
    attachment: Attachment,
    run: Run,
}

impl Observer for OneWay {
    fn observer_id(&self) -> ObserverId {
        self.attachment.id()
    }

    fn on_change(&self, _source: CellId) -> Result<()> {
        if !self.attachment.is_attached() {
            return Ok(());
        }
        (self.run)()
    }
}

/// A one-way edge from one or more sources into a target.
///
/// # Example
///
/// ```rust,ignore
/// // model.transform follows transform.matrix
/// let binding = Binding::new(&model.transform, &transform.matrix)?;
///
/// // editor model is hidden while selected
/// let visible = Binding::computed(
///     &editor_model.enabled,
///     move || !selected.get(),
///     &[entity.editor_selected()],
/// )?;
/// ```
#[derive(Clone)]
pub struct Binding {
    inner: Arc<OneWay>,
}

impl Binding {
    /// Copy `source` into `target` whenever it changes.
    pub fn new<T>(target: &Property<T>, source: &Property<T>) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (target, from) = (target.clone(), source.clone());
        Self::build(vec![source.clone_source()], move || target.set(from.get()))
    }

    /// Write `project(source)` into `target` whenever `source` changes.
    pub fn map<S, T, F>(target: &Property<T>, source: &Property<S>, project: F) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let (target, from) = (target.clone(), source.clone());
        Self::build(vec![source.clone_source()], move || {
            let value = from.with(&project);
            target.set(value)
        })
    }

    /// Write `compute()` into `target` whenever any of `deps` changes.
    ///
    /// `compute` reads whatever it needs; `deps` declares what it depends on.
    pub fn computed<T, F>(target: &Property<T>, compute: F, deps: &[&dyn Source]) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let target = target.clone();
        Self::build(Attachment::collect(deps), move || target.set(compute()))
    }

    /// Run a side effect whenever any of `deps` changes, and once now.
    ///
    /// This is the target-less form: useful for pushing values into an
    /// external collaborator such as a renderer parameter.
    pub fn effect<F>(effect: F, deps: &[&dyn Source]) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self::build(Attachment::collect(deps), effect)
    }

    fn build<F>(sources: Vec<Box<dyn Source>>, run: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let inner = Arc::new(OneWay {
            attachment: Attachment::new(EdgeKind::OneWay, sources),
            run: Box::new(run),
        });
        let observer: Weak<dyn Observer> = Arc::downgrade(&inner) as Weak<dyn Observer>;
        inner.attachment.attach(observer);

        (inner.run)()?;
        Ok(Self { inner })
    }
}

impl Edge for Binding {
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

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id())
            .field("attached", &self.is_attached())
            .finish()
    }
}
