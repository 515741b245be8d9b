//! Pipeline construction and execution.
//!
//! A [`Pipeline`] is a value. [`append`](Pipeline::append) never touches the
//! receiver: it copies the step list into a fresh slice and returns a new
//! pipeline. Two pipelines grown from a common prefix therefore share
//! nothing mutable and can be extended, compiled and run independently.
//!
//! ```rust
//! use pipes::{Context, ContextKey, Exchange, Next, Pipeline, Request};
//!
//! const USER: ContextKey = ContextKey::new("user");
//!
//! fn authenticate(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
//!     match ex.request.header("x-user").map(str::to_owned) {
//!         Some(user) => next.run(ctx.with_value(USER, user), ex),
//!         None => ex.response.write_status(http::StatusCode::UNAUTHORIZED),
//!     }
//! }
//!
//! fn greet(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
//!     let user = ctx.value::<String>(&USER).cloned().unwrap_or_default();
//!     ex.response.write(format!("hello {user}"));
//!     next.run(ctx, ex);
//! }
//!
//! let handler = Pipeline::new().append(authenticate).append(greet).compile();
//!
//! let mut ex = Exchange::new(Request::new(http::Method::GET, "/"));
//! handler.handle(&mut ex).unwrap();
//! assert_eq!(ex.response.status(), http::StatusCode::UNAUTHORIZED);
//! ```

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{BoxError, Error};
use crate::step::{BoxedStep, FnStep, Next, Step};

/// Builds a context fallibly from the exchange.
type ContextConstructor<C, X> =
    Arc<dyn Fn(&X) -> Result<C, BoxError> + Send + Sync + 'static>;

fn constructor<C, X, F>(construct: F) -> ContextConstructor<C, X>
where
    F: Fn(&X) -> Result<C, BoxError> + Send + Sync + 'static,
{
    Arc::new(construct)
}

/// Where the initial context value of an execution comes from.
enum Init<C, X> {
    /// No constructor: the context type's empty value.
    Empty(fn() -> C),
    Constructor(ContextConstructor<C, X>),
}

impl<C, X> Init<C, X> {
    fn context(&self, exchange: &X) -> Result<C, Error> {
        match self {
            Self::Empty(empty) => Ok(empty()),
            Self::Constructor(construct) => construct(exchange).map_err(Error::context),
        }
    }
}

impl<C, X> Clone for Init<C, X> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty(empty) => Self::Empty(*empty),
            Self::Constructor(construct) => Self::Constructor(Arc::clone(construct)),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// An immutable, ordered sequence of middleware steps.
///
/// `C` is the context type threaded from step to step, `X` the exchange every
/// step receives. For HTTP these are [`Context`](crate::Context) and
/// [`Exchange`](crate::Exchange), but the pipeline never looks inside either.
pub struct Pipeline<C, X> {
    steps: Arc<[BoxedStep<C, X>]>,
    init: Init<C, X>,
}

impl<C: Default, X> Pipeline<C, X> {
    /// An empty pipeline whose executions start from `C::default()`.
    pub fn new() -> Self {
        Self::from_init(Init::Empty(C::default))
    }
}

impl<C: Default, X> Default for Pipeline<C, X> {
    fn default() -> Self { Self::new() }
}

impl<C, X> Pipeline<C, X> {
    /// An empty pipeline whose executions start from `construct(&exchange)`.
    ///
    /// The constructor runs once per execution, before the first step, and
    /// never for a pipeline without steps.
    pub fn with_context<F>(construct: F) -> Self
    where
        F: Fn(&X) -> C + Send + Sync + 'static,
    {
        Self::from_init(Init::Constructor(constructor(move |x| Ok(construct(x)))))
    }

    /// Like [`with_context`](Pipeline::with_context), but the constructor may
    /// fail. A failure is returned by [`Handler::handle`] before any step
    /// runs, as an [`ErrorKind::Context`](crate::ErrorKind::Context) error.
    pub fn try_with_context<F, E>(construct: F) -> Self
    where
        F: Fn(&X) -> Result<C, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_init(Init::Constructor(constructor(move |x| {
            construct(x).map_err(Into::into)
        })))
    }

    fn from_init(init: Init<C, X>) -> Self {
        Self { steps: Arc::from(Vec::new()), init }
    }

    /// Returns a new pipeline with `step` after all of this one's steps.
    ///
    /// `self` is left exactly as it was.
    #[must_use]
    pub fn append<F>(&self, step: F) -> Self
    where
        F: Fn(C, &mut X, Next<'_, C, X>) + Send + Sync + 'static,
    {
        self.push(Arc::new(FnStep(step)))
    }

    /// Like [`append`](Pipeline::append), for a type implementing [`Step`].
    #[must_use]
    pub fn append_step<S>(&self, step: S) -> Self
    where
        S: Step<C, X> + Send + Sync + 'static,
    {
        self.push(Arc::new(step))
    }

    fn push(&self, step: BoxedStep<C, X>) -> Self {
        // Fresh allocation every time: siblings built from the same prefix
        // must never see each other's steps.
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().cloned());
        steps.push(step);
        Self { steps: steps.into(), init: self.init.clone() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Produces the runnable entry point for the current step list.
    ///
    /// Cheap: two reference-count increments. Steps appended to this pipeline
    /// afterwards produce new pipelines and do not reach the returned handler.
    pub fn compile(&self) -> Handler<C, X> {
        Handler { steps: Arc::clone(&self.steps), init: self.init.clone() }
    }

    /// Compiles and runs the pipeline once against `exchange`.
    pub fn run(&self, exchange: &mut X) -> Result<(), Error> {
        execute(&self.steps, &self.init, exchange)
    }
}

impl<C, X> Clone for Pipeline<C, X> {
    fn clone(&self) -> Self {
        Self { steps: Arc::clone(&self.steps), init: self.init.clone() }
    }
}

impl<C, X> fmt::Debug for Pipeline<C, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("steps", &self.steps.len()).finish()
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A compiled pipeline: the entry point the transport calls once per
/// exchange.
///
/// `Handler` is `Send + Sync` and cheap to clone. Every call to
/// [`handle`](Handler::handle) gets its own cursor, so one handler can serve
/// any number of exchanges concurrently.
pub struct Handler<C, X> {
    steps: Arc<[BoxedStep<C, X>]>,
    init: Init<C, X>,
}

impl<C, X> Handler<C, X> {
    /// Runs the chain against `exchange`.
    ///
    /// Returns an error only if the context constructor fails, in which case
    /// no step has run. Panics raised by steps propagate to the caller.
    pub fn handle(&self, exchange: &mut X) -> Result<(), Error> {
        execute(&self.steps, &self.init, exchange)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<C, X> Clone for Handler<C, X> {
    fn clone(&self) -> Self {
        Self { steps: Arc::clone(&self.steps), init: self.init.clone() }
    }
}

impl<C, X> fmt::Debug for Handler<C, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("steps", &self.steps.len()).finish()
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

fn execute<C, X>(steps: &[BoxedStep<C, X>], init: &Init<C, X>, exchange: &mut X) -> Result<(), Error> {
    if steps.is_empty() {
        return Ok(());
    }

    let ctx = init.context(exchange)?;

    // One cursor per execution, living on this call's stack only.
    let cursor = Cell::new(0);
    trace!(steps = steps.len(), "running pipeline");
    Next::new(steps, &cursor).run(ctx, exchange);

    let started = cursor.get().min(steps.len());
    if started < steps.len() {
        debug!(started, steps = steps.len(), "pipeline short-circuited");
    }
    Ok(())
}
