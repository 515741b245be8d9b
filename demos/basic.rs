//! Minimal pipes example: tracing, panic recovery, header auth, and a
//! before/after timing step.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/hello
//!   curl -i -H 'x-user: alice' http://localhost:3000/hello
//!   curl -i -H 'x-user: alice' http://localhost:3000/panic

use std::time::Instant;

use http::{HeaderValue, StatusCode};
use pipes::{Context, ContextKey, Exchange, Next, Pipeline, Server, middleware};

const USER: ContextKey = ContextKey::namespaced("Demo", "user");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Pipeline::<Context, Exchange>::new()
        .append(middleware::trace)
        .append(middleware::recover)
        .append(timing)
        .append(authenticate)
        .append(hello);

    Server::bind("0.0.0.0:3000")
        .serve(app.compile())
        .await
        .expect("server error");
}

// Adds `x-elapsed-us` after every later step has run.
fn timing(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    let started = Instant::now();
    next.run(ctx, ex);

    let elapsed = started.elapsed().as_micros().to_string();
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        ex.response.set_header("x-elapsed-us", value);
    }
}

// No `x-user` header → 401 and the chain stops here.
fn authenticate(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    match ex.request.header("x-user").map(str::to_owned) {
        Some(user) => next.run(ctx.with_value(USER, user), ex),
        None => ex.response.write_status(StatusCode::UNAUTHORIZED),
    }
}

fn hello(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    if ex.request.path() == "/panic" {
        panic!("requested panic");
    }

    let user = ctx.value::<String>(&USER).map(String::as_str).unwrap_or("stranger");
    ex.response.write(format!("hello {user}\n"));
    next.run(ctx, ex);
}
