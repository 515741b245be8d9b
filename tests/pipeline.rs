use std::sync::{Arc, Mutex};
use std::thread;

use http::{HeaderValue, Method, StatusCode};
use pipes::{Context, ContextKey, Exchange, Next, Pipeline, Request};

const MIDDLEWARE_ID: ContextKey = ContextKey::new("pipeline");

fn exchange() -> Exchange {
    Exchange::new(Request::new(Method::GET, "/test"))
}

fn fresh_context(_: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    next.run(Context::new(), ex);
}

fn middleware_a(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    ex.response.set_header("pipeline", HeaderValue::from_static("A"));
    next.run(ctx, ex);
}

fn middleware_b(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    ex.response.set_header("pipeline", HeaderValue::from_static("B"));
    next.run(ctx, ex);
}

fn set_context(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    next.run(ctx.with_value(MIDDLEWARE_ID, "1"), ex);
}

fn content_a(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    ex.response.write("a");
    next.run(ctx, ex);
}

fn content_b(ctx: Context, ex: &mut Exchange, next: Next<'_, Context, Exchange>) {
    ex.response.write("b");
    next.run(ctx, ex);
}

/// Step that records `name` into a shared journal and continues.
fn journal(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> impl Fn(Context, &mut Exchange, Next<'_, Context, Exchange>) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |ctx, ex, next| {
        log.lock().unwrap().push(name);
        next.run(ctx, ex);
    }
}

/// Step that records `name` and ends the chain.
fn halt(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> impl Fn(Context, &mut Exchange, Next<'_, Context, Exchange>) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |_ctx, _ex, _next| log.lock().unwrap().push(name)
}

#[test]
fn append_never_mutates_the_receiver() {
    let pipeline = Pipeline::<Context, Exchange>::new();
    let pipeline1 = pipeline.append(middleware_a);
    let pipeline2 = pipeline1.append(middleware_b);
    let pipeline3 = pipeline.append(fresh_context);

    assert_eq!(pipeline.len(), 0);
    assert_eq!(pipeline1.len(), 1);
    assert_eq!(pipeline2.len(), 2);
    assert_eq!(pipeline3.len(), 1);

    let mut ex = exchange();
    pipeline1.run(&mut ex).unwrap();
    assert_eq!(ex.response.header("pipeline"), Some("A"));
}

#[test]
fn empty_pipeline_is_a_no_op() {
    let mut ex = exchange();
    Pipeline::<Context, Exchange>::new().compile().handle(&mut ex).unwrap();

    assert!(!ex.response.is_written());
    assert!(ex.response.headers().is_empty());
}

#[test]
fn steps_run_once_in_append_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler = Pipeline::<Context, Exchange>::new()
        .append(journal(&log, "A"))
        .append(journal(&log, "B"))
        .compile();

    let mut ex = exchange();
    handler.handle(&mut ex).unwrap();

    assert_eq!(*log.lock().unwrap(), ["A", "B"]);
}

#[test]
fn last_writer_wins_through_the_chain() {
    let mut ex = exchange();
    Pipeline::new()
        .append(middleware_a)
        .append(middleware_b)
        .run(&mut ex)
        .unwrap();

    assert_eq!(ex.response.header("pipeline"), Some("B"));
}

#[test]
fn skipping_next_short_circuits() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let guard_log = Arc::clone(&log);
    let pipeline = Pipeline::<Context, Exchange>::new()
        .append(move |_ctx, ex, _next| {
            guard_log.lock().unwrap().push("A");
            ex.response.write_status(StatusCode::FORBIDDEN);
        })
        .append(journal(&log, "B"));

    let mut ex = exchange();
    pipeline.run(&mut ex).unwrap();

    assert_eq!(*log.lock().unwrap(), ["A"]);
    assert_eq!(ex.response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn replaced_context_reaches_the_next_step() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let pipeline = Pipeline::<Context, Exchange>::new()
        .append(set_context)
        .append(move |ctx, ex, next| {
            *sink.lock().unwrap() = ctx.value::<&str>(&MIDDLEWARE_ID).copied();
            next.run(ctx, ex);
        });

    let mut ex = exchange();
    pipeline.run(&mut ex).unwrap();

    assert_eq!(*seen.lock().unwrap(), Some("1"));
    assert_eq!(MIDDLEWARE_ID.to_string(), "Pipes. Context key: pipeline");
}

#[test]
fn context_constructor_seeds_the_first_step() {
    const METHOD: ContextKey = ContextKey::new("method");

    let pipeline = Pipeline::with_context(|ex: &Exchange| {
        Context::new().with_value(METHOD, ex.request.method().clone())
    })
    .append(|ctx, ex, next| {
        let method = ctx.value::<Method>(&METHOD).cloned().unwrap_or_default();
        ex.response.write(method.as_str());
        next.run(ctx, ex);
    });

    let mut ex = Exchange::new(Request::new(Method::PATCH, "/"));
    pipeline.run(&mut ex).unwrap();
    assert_eq!(ex.response.body(), b"PATCH");
}

#[test]
fn derived_pipelines_run_independently() {
    let pipeline = Pipeline::new()
        .append(fresh_context)
        .append(middleware_a)
        .append(middleware_b)
        .append(middleware_a)
        .append(middleware_b);

    let handler1 = pipeline.append(content_a).compile();
    let handler2 = pipeline.append(content_b).compile();

    let mut ex1 = exchange();
    handler1.handle(&mut ex1).unwrap();
    assert_eq!(ex1.response.status(), StatusCode::OK);
    assert_eq!(ex1.response.body(), b"a");

    let mut ex2 = exchange();
    handler2.handle(&mut ex2).unwrap();
    assert_eq!(ex2.response.status(), StatusCode::OK);
    assert_eq!(ex2.response.body(), b"b");

    assert_eq!(pipeline.len(), 5);
}

#[test]
fn one_handler_serves_concurrent_exchanges() {
    let handler = Pipeline::<Context, Exchange>::new()
        .append(middleware_a)
        .append(|ctx, ex, next| {
            let path = ex.request.path().to_owned();
            ex.response.write(path);
            next.run(ctx, ex);
        })
        .compile();

    let bodies: Vec<Vec<u8>> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let handler = &handler;
                s.spawn(move || {
                    let mut ex = Exchange::new(Request::new(Method::GET, &format!("/{i}")));
                    handler.handle(&mut ex).unwrap();
                    ex.response.body().to_vec()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for (i, body) in bodies.iter().enumerate() {
        assert_eq!(body, format!("/{i}").as_bytes());
    }
}

#[test]
fn wrapping_step_sees_downstream_writes() {
    let pipeline = Pipeline::<Context, Exchange>::new()
        .append(|ctx, ex, next| {
            ex.response.write("<");
            next.run(ctx, ex);
            let len = ex.response.body().len();
            ex.response.write(format!(">{len}"));
        })
        .append(content_a);

    let mut ex = exchange();
    pipeline.run(&mut ex).unwrap();
    assert_eq!(ex.response.body(), b"<a>2");
}

#[test]
fn calling_next_repeatedly_advances_then_stops() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::<Context, Exchange>::new()
        .append(|ctx: Context, ex, next| {
            next.run(ctx.clone(), ex);
            next.run(ctx.clone(), ex);
            next.run(ctx, ex);
        })
        .append(journal(&log, "B"))
        .append(journal(&log, "C"));

    let mut ex = exchange();
    pipeline.run(&mut ex).unwrap();

    assert_eq!(*log.lock().unwrap(), ["B", "C"]);
}

#[test]
fn repeated_next_without_chaining_visits_each_step() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::<Context, Exchange>::new()
        .append(|ctx: Context, ex, next| {
            next.run(ctx.clone(), ex);
            next.run(ctx, ex);
        })
        .append(halt(&log, "B"))
        .append(halt(&log, "C"))
        .append(halt(&log, "D"));

    let mut ex = exchange();
    pipeline.run(&mut ex).unwrap();

    assert_eq!(*log.lock().unwrap(), ["B", "C"]);
}
