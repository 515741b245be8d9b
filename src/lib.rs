//! # pipes
//!
//! Immutable middleware pipelines with explicit continuations.
//!
//! ## The contract
//!
//! A [`Pipeline`] is an ordered list of steps. Each step gets three things:
//! the request-scoped context, the exchange, and a [`Next`] continuation.
//! Calling `next.run(ctx, ex)` hands control to the following step. Not
//! calling it stops the chain right there. That is the whole control-flow
//! model: no return signals, no priorities, no reordering.
//!
//! - **Pipelines are values.** [`Pipeline::append`] returns a new pipeline
//!   and leaves the receiver alone, so a shared base can be specialised in
//!   several directions without interference.
//! - **Executions are independent.** Every call of a compiled [`Handler`]
//!   gets its own cursor. One handler serves any number of requests at once.
//! - **Context is replaceable.** A step may pass a different context value
//!   to `next.run`; the following step sees exactly that value.
//!
//! The core is generic over both the context type and the exchange type. For
//! HTTP, pipes ships [`Context`] (a persistent key/value chain keyed by
//! [`ContextKey`]), [`Exchange`] and a hyper-based [`Server`]. No routing:
//! put a router *in* a step if you need one.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pipes::{Context, ContextKey, Exchange, Next, Pipeline, Server, middleware};
//!
//! const USER: ContextKey = ContextKey::new("user");
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Pipeline::<Context, Exchange>::new()
//!         .append(middleware::trace)
//!         .append(authenticate)
//!         .append(hello);
//!
//!     Server::bind("0.0.0.0:3000").serve(app.compile()).await.unwrap();
//! }
//!
//! fn authenticate(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
//!     let Some(user) = ex.request.header("x-user").map(str::to_owned) else {
//!         // Not calling `next` ends the chain here.
//!         ex.response.write_status(http::StatusCode::UNAUTHORIZED);
//!         return;
//!     };
//!     next.run(ctx.with_value(USER, user), ex);
//! }
//!
//! fn hello(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
//!     let user = ctx.value::<String>(&USER).map(String::as_str).unwrap_or("?");
//!     ex.response.write(format!("hello {user}"));
//!     next.run(ctx, ex);
//! }
//! ```

mod context;
mod error;
mod exchange;
mod pipeline;
mod request;
mod response;
mod server;
mod step;

pub mod middleware;

pub use context::{Context, ContextKey, DEFAULT_NAMESPACE};
pub use error::{BoxError, Error, ErrorKind};
pub use exchange::Exchange;
pub use pipeline::{Handler, Pipeline};
pub use request::Request;
pub use response::Response;
pub use server::Server;
pub use step::{Next, Step};
