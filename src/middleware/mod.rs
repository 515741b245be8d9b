//! Built-in middleware for HTTP pipelines.
//!
//! Middleware here is ordinary steps: append them like any other.
//!
//! ```rust
//! use pipes::{Context, Exchange, Pipeline, middleware};
//!
//! let pipeline = Pipeline::<Context, Exchange>::new()
//!     .append(middleware::trace)
//!     .append(middleware::recover);
//! assert_eq!(pipeline.len(), 2);
//! ```
//!
//! - [`trace`]: one log event per request with method, path, status, latency
//! - [`recover`]: turns a panic further down the chain into `500`

mod recover;
mod trace;

pub use recover::recover;
pub use trace::trace;
