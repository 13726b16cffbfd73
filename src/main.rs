// src/main.rs
use anyhow::{Context, Result};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use dns_monitor::{
    config,
    dns::{DnsLookup, HickoryResolver},
    history::{HistoryStore, LogWriter, DEFAULT_QUEUE_CAPACITY},
    metrics::MetricsRegistry,
    monitor::Scheduler,
    server::{ServerBuilder, StatusHandler},
    status::StatusPublisher,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dns_monitor=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    // Resolvers
    let timeout = config.global.lookup_timeout;
    let primary: Arc<dyn DnsLookup> = Arc::new(
        HickoryResolver::new(&config.global.dns_server, timeout)
            .context("Failed to configure primary DNS resolver")?,
    );
    let secondary: Option<Arc<dyn DnsLookup>> = match &config.global.secondary_dns_server {
        Some(server) => Some(Arc::new(
            HickoryResolver::new(server, timeout)
                .context("Failed to configure secondary DNS resolver")?,
        )),
        None => None,
    };

    // History, seeded from the per-check logs
    let (log_writer, log_writer_handle) =
        LogWriter::spawn(DEFAULT_QUEUE_CAPACITY, Some(metrics.clone()));
    let store = Arc::new(
        HistoryStore::open(
            config.check_specs(),
            &config.global.log_dir,
            Some(log_writer),
            Some(metrics.clone()),
        )
        .await,
    );

    let publisher = Arc::new(StatusPublisher::new(
        store.clone(),
        primary.server(),
        secondary.as_ref().map(|s| s.server().to_string()),
    )?);

    // Start check loops
    let scheduler = Scheduler::new(store, primary, secondary, Some(metrics.clone())).start();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr = SocketAddr::new(config.global.bind_address, config.metrics.port);
        start_metrics_server(
            metrics_addr,
            metrics_registry,
            config.metrics.path.clone(),
            shutdown_rx.clone(),
        )
        .await?;
    }

    // Serve the status page until a shutdown signal arrives
    let handler = StatusHandler::new(publisher, Some(metrics));
    let served = ServerBuilder::new(config.listen_addr())
        .with_handler(handler)
        .with_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .serve()
        .await;

    scheduler.shutdown().await;
    log_writer_handle.shutdown().await;

    served
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Ok::<_, Infallible>(status_response(
                            StatusCode::NOT_FOUND,
                            Body::from("Not Found"),
                        ));
                    }

                    let response = match registry.gather() {
                        Ok(metrics) => {
                            let mut response = Response::new(Body::from(metrics));
                            response.headers_mut().insert(
                                hyper::header::CONTENT_TYPE,
                                hyper::header::HeaderValue::from_static(
                                    "text/plain; version=0.0.4",
                                ),
                            );
                            response
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            status_response(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Body::from("Internal Server Error"),
                            )
                        }
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?
        .serve(make_service)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        });

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn status_response(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
