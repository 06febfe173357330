//! Propagation Stack
//!
//! Tracks which cells are currently pushing changes to their observers.
//! Propagation is synchronous and depth-first: a `set` does not return until
//! every transitively dependent edge has run, so the chain of active cells is
//! exactly the Rust call stack. Recording it explicitly lets the runtime bound
//! its depth and turn a non-converging binding cycle into an error instead of
//! a stack overflow.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a propagation scope pushes the source
//! cell and returns a guard; dropping the guard pops it. The guard pops even
//! when an observer returns an error, so the stack stays balanced.

use std::cell::{Cell, RefCell};

use super::observer::CellId;
use crate::error::{BindError, Result};

/// Default bound on nested propagation.
pub const DEFAULT_MAX_DEPTH: usize = 256;

thread_local! {
    static STACK: RefCell<Vec<CellId>> = const { RefCell::new(Vec::new()) };
    static MAX_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_DEPTH) };
}

/// Guard that pops the propagation stack when dropped.
pub struct PropagationScope {
    source: CellId,
}

impl PropagationScope {
    /// Enter a propagation scope for the given source cell.
    ///
    /// Fails with [`BindError::PropagationDepthExceeded`] if the stack is
    /// already at the configured bound.
    pub fn enter(source: CellId) -> Result<Self> {
        let limit = MAX_DEPTH.with(Cell::get);
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() >= limit {
                return Err(BindError::PropagationDepthExceeded { limit });
            }
            stack.push(source);
            Ok(())
        })?;
        Ok(Self { source })
    }

    /// Current nesting depth on this thread.
    pub fn depth() -> usize {
        STACK.with(|stack| stack.borrow().len())
    }

    /// The cell whose observers are currently running, if any.
    pub fn current() -> Option<CellId> {
        STACK.with(|stack| stack.borrow().last().copied())
    }

    /// Whether `cell` is anywhere on the active propagation path.
    pub fn is_propagating(cell: CellId) -> bool {
        STACK.with(|stack| stack.borrow().contains(&cell))
    }

    /// The configured depth bound for this thread.
    pub fn max_depth() -> usize {
        MAX_DEPTH.with(Cell::get)
    }

    /// Set the depth bound for this thread. Values below 1 are clamped to 1.
    pub fn set_max_depth(limit: usize) {
        MAX_DEPTH.with(|max| max.set(limit.max(1)));
    }

    /// Apply `limit` on this thread until the returned guard is dropped,
    /// then restore the previous bound.
    pub fn limit(limit: usize) -> DepthLimit {
        let previous = Self::max_depth();
        Self::set_max_depth(limit);
        DepthLimit { previous }
    }
}

/// Guard returned by [`PropagationScope::limit`].
#[must_use = "the bound is restored when the guard is dropped"]
pub struct DepthLimit {
    previous: usize,
}

impl Drop for DepthLimit {
    fn drop(&mut self) {
        PropagationScope::set_max_depth(self.previous);
    }
}

impl Drop for PropagationScope {
    fn drop(&mut self) {
        STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.source),
                "propagation scope mismatch for {:?}",
                self.source
            );
        });
    }
}
