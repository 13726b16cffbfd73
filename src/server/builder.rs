// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tower::Service;

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder pattern so `main.rs` can inject the status handler and a shutdown signal.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    shutdown: Option<BoxFuture<'static, ()>>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            shutdown: None,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Stop accepting connections once `signal` completes.
    pub fn with_shutdown<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Some(signal.boxed());
        self
    }

    /// Consume the builder, boot the TCP listener, spawn one Hyper task per connection.
    pub async fn serve(self) -> Result<()> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;
        let mut shutdown = self
            .shutdown
            .unwrap_or_else(|| futures::future::pending().boxed());

        let listener = bind_tcp(self.addr).await?;
        tracing::info!("Status page listening on http://{}", self.addr);
        let listener = &listener;

        loop {
            let (stream, peer) = tokio::select! {
                accepted = accept_next(move || listener.accept()) => accepted,
                _ = &mut shutdown => {
                    tracing::info!("Status server no longer accepting connections");
                    return Ok(());
                }
            };
            let svc = handler.clone();

            tokio::spawn(async move {
                let http = Http::new();
                if let Err(err) = http.serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}

/// Waits for the next connection. Accept failures are logged and retried
/// after a short pause; they never stop the server.
async fn accept_next<F, Fut, S, A>(mut accept: F) -> (S, A)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<(S, A)>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(err) => {
                tracing::warn!(%err, "failed to accept connection, retrying");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
