use std::panic::{self, AssertUnwindSafe};

use http::StatusCode;
use tracing::error;

use crate::exchange::Exchange;
use crate::response::Response;
use crate::step::Next;

/// Catches a panic raised by any later step and answers
/// `500 Internal Server Error` instead.
///
/// Headers set by steps before `recover` are kept. Everything else is
/// replaced by a bodiless `500`: the panicking chain's writes, and any
/// status or body written earlier.
pub fn recover<C>(ctx: C, ex: &mut Exchange, next: Next<'_, C, Exchange>) {
    let upstream_headers = ex.response.headers().clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| next.run(ctx, ex)));

    if let Err(payload) = outcome {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        error!(method = %ex.request.method(), path = ex.request.path(), "step panicked: {message}");

        ex.response = Response::with_status(StatusCode::INTERNAL_SERVER_ERROR);
        *ex.response.headers_mut() = upstream_headers;
    }
}
