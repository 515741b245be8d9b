//! Middleware steps, type erasure, and the continuation handle.
//!
//! # How steps are stored
//!
//! A pipeline holds steps of *different* concrete types (named `fn` items,
//! closures, user structs) in one slice, so each one is hidden behind a
//! `dyn Step` trait object:
//!
//! ```text
//! fn auth(ctx, ex, next) { … }          ← user writes this
//!        ↓ pipeline.append(auth)
//! FnStep(auth)                          ← wrapper implementing Step
//!        ↓  stored as BoxedStep = Arc<dyn Step + Send + Sync>
//! step.call(ctx, ex, next)  at run time ← one vtable dispatch
//! ```
//!
//! Steps are shared between every pipeline derived from the one they were
//! appended to, so they live behind `Arc` and are only ever called through
//! `&self`.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

/// One unit of request-processing behavior.
///
/// A step receives the context value handed to it by its caller, the
/// exchange, and a [`Next`] continuation. Calling [`Next::run`] hands control
/// to the following step; not calling it ends the chain here.
///
/// Closures and `fn` items are appended with
/// [`Pipeline::append`](crate::Pipeline::append). Implement this trait
/// directly for steps that carry configuration, and append them with
/// [`Pipeline::append_step`](crate::Pipeline::append_step):
///
/// ```rust
/// use pipes::{Next, Pipeline, Step};
///
/// struct Tag(&'static str);
///
/// impl Step<(), Vec<&'static str>> for Tag {
///     fn call(&self, ctx: (), out: &mut Vec<&'static str>, next: Next<'_, (), Vec<&'static str>>) {
///         out.push(self.0);
///         next.run(ctx, out);
///     }
/// }
///
/// let pipeline = Pipeline::<(), Vec<&'static str>>::new()
///     .append_step(Tag("a"))
///     .append_step(Tag("b"));
/// let mut out = Vec::new();
/// pipeline.run(&mut out).unwrap();
/// assert_eq!(out, ["a", "b"]);
/// ```
pub trait Step<C, X> {
    fn call(&self, ctx: C, exchange: &mut X, next: Next<'_, C, X>);
}

/// A type-erased step shared by every pipeline that contains it.
pub(crate) type BoxedStep<C, X> = Arc<dyn Step<C, X> + Send + Sync + 'static>;

/// Adapts a plain function or closure to [`Step`].
pub(crate) struct FnStep<F>(pub(crate) F);

impl<C, X, F> Step<C, X> for FnStep<F>
where
    F: Fn(C, &mut X, Next<'_, C, X>),
{
    fn call(&self, ctx: C, exchange: &mut X, next: Next<'_, C, X>) {
        (self.0)(ctx, exchange, next)
    }
}

// ── Continuation ──────────────────────────────────────────────────────────────

/// The continuation handed to every step.
///
/// `Next` is a cheap `Copy` handle onto the running execution: the shared
/// step slice plus a cursor that exists only for this one call of the
/// compiled pipeline. Each [`run`](Next::run) advances the cursor by one, so
/// a step may call it any number of times:
///
/// - **zero** times to short-circuit the rest of the chain,
/// - **once** to continue, with the same or a replaced context,
/// - **again** after it returns, which is a no-op once the chain is
///   exhausted.
///
/// Work done after `run` returns sees the exchange as every downstream step
/// left it, which is how before/after middleware is written.
pub struct Next<'a, C, X> {
    steps: &'a [BoxedStep<C, X>],
    cursor: &'a Cell<usize>,
}

impl<'a, C, X> Next<'a, C, X> {
    pub(crate) fn new(steps: &'a [BoxedStep<C, X>], cursor: &'a Cell<usize>) -> Self {
        Self { steps, cursor }
    }

    /// Hands `ctx` and the exchange to the next step, if there is one.
    pub fn run(self, ctx: C, exchange: &mut X) {
        // The cursor holds the index of the step to run next.
        let position = self.cursor.get();
        self.cursor.set(position.saturating_add(1));
        if let Some(step) = self.steps.get(position) {
            step.call(ctx, exchange, self);
        }
    }

    /// Steps that have not been started yet in this execution.
    pub fn remaining(&self) -> usize {
        self.steps.len().saturating_sub(self.cursor.get())
    }
}

// Manual impls: deriving would demand `C: Copy` and `X: Copy`.
impl<C, X> Clone for Next<'_, C, X> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, X> Copy for Next<'_, C, X> {}

impl<C, X> fmt::Debug for Next<'_, C, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.cursor.get())
            .field("steps", &self.steps.len())
            .finish()
    }
}
