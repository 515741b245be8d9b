//! HTTP server and graceful shutdown.
//!
//! The server owns connections; the pipeline owns request handling. Each
//! request becomes one [`Exchange`], the compiled [`Handler`] runs against it
//! on tokio's blocking pool (steps are plain synchronous code and may block),
//! and whatever the steps wrote into the response is sent back.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Telling every open connection to finish its in-flight request and
//!    close; idle keep-alive connections close right away.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::exchange::Exchange;
use crate::pipeline::Handler;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// use pipes::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and running `handler` for every request.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve<C: 'static>(self, handler: Handler<C, Exchange>) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting once `signal`
    /// resolves.
    pub async fn serve_with_shutdown<C, S>(self, handler: Handler<C, Exchange>, signal: S) -> Result<(), Error>
    where
        C: 'static,
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        accept_loop(listener, handler, signal).await;
        Ok(())
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Serves connections from `listener` until `signal` resolves, then tells
/// every open connection to finish its current request and close.
async fn accept_loop<C, S>(listener: TcpListener, handler: Handler<C, Exchange>, signal: S)
where
    C: 'static,
    S: Future<Output = ()>,
{
    let addr = listener.local_addr().ok();
    info!(addr = ?addr, steps = handler.len(), "pipes listening");

    let builder = ConnBuilder::new(TokioExecutor::new());
    // Idle keep-alive connections would otherwise hold the drain open until
    // the client hangs up.
    let graceful = GracefulShutdown::new();
    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Check shutdown first so a SIGTERM stops accepting even if
            // more connections are queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let handler = handler.clone();
                // Called once per request on the connection.
                let svc = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    dispatch(handler.clone(), req, remote_addr)
                });
                let conn = builder.serve_connection(TokioIo::new(stream), svc).into_owned();
                let conn = graceful.watch(conn);

                tasks.spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    graceful.shutdown().await;
    while tasks.join_next().await.is_some() {}

    info!("pipes stopped");
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through the pipeline and produces one response.
///
/// Never fails towards hyper: body read errors become `400`, constructor
/// failures and step panics become `500`.
async fn dispatch<C, B>(
    handler: Handler<C, Exchange>,
    req: http::Request<B>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    C: 'static,
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::with_status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let mut exchange = Exchange::new(Request::from_parts(parts, body, remote_addr));
    let outcome = tokio::task::spawn_blocking(move || {
        let result = handler.handle(&mut exchange);
        (exchange, result)
    })
    .await;

    let response = match outcome {
        Ok((exchange, Ok(()))) => exchange.response,
        Ok((exchange, Err(e))) => {
            error!(method = %exchange.request.method(), path = exchange.request.path(), "pipeline failed: {e}");
            Response::with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            error!(peer = %remote_addr, "pipeline panicked: {e}");
            Response::with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by the Kubernetes control
/// plane) and **SIGINT** (Ctrl-C, for local dev). On Windows only Ctrl-C is
/// available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
