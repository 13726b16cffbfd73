// src/server/handler.rs
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, Instrument};
use uuid::Uuid;

use crate::metrics::MetricsCollector;
use crate::status::StatusPublisher;

/// Serves the status page at `/`. Every other path is a 404.
#[derive(Clone)]
pub struct StatusHandler {
    publisher: Arc<StatusPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl StatusHandler {
    pub fn new(publisher: Arc<StatusPublisher>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self { publisher, metrics }
    }

    async fn handle(publisher: &StatusPublisher, req: Request<Body>) -> Response<Body> {
        if req.uri().path() != "/" {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }

        if req.method() != Method::GET && req.method() != Method::HEAD {
            let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        match publisher.render().await {
            Ok(html) => {
                let mut response = Response::new(Body::from(html));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                response
            }
            Err(e) => {
                error!("Status page render failed: {:#}", e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

impl Service<Request<Body>> for StatusHandler {
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let publisher = self.publisher.clone();
        let metrics = self.metrics.clone();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path()
        );

        Box::pin(
            async move {
                let response = Self::handle(&publisher, req).await;
                debug!(status = %response.status(), "status request served");
                if let Some(metrics) = &metrics {
                    metrics.record_status_request(response.status().as_u16());
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
