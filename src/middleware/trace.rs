use std::time::Instant;

use tracing::info;

use crate::exchange::Exchange;
use crate::step::Next;

/// Logs method, path, status and latency once the rest of the chain has run.
///
/// Append it first so the latency covers every other step. A panic further
/// down unwinds straight through `trace` and the request goes unlogged, so
/// keep [`recover`](crate::middleware::recover) below it.
pub fn trace<C>(ctx: C, ex: &mut Exchange, next: Next<'_, C, Exchange>) {
    let started = Instant::now();
    next.run(ctx, ex);

    info!(
        method = %ex.request.method(),
        path = ex.request.path(),
        status = ex.response.status().as_u16(),
        latency_us = started.elapsed().as_micros() as u64,
        "request"
    );
}
