//! Metrics and health endpoint
//!
//! Serves `/metrics` (Prometheus text format) and `/healthz` over plain HTTP/1.

use crate::apis::metrics::CONTROLLER_METRICS_REGISTRY;
use crate::error::RautaError;
use crate::queue::rate_limiter::rate_limiter_registry;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

type HttpResponse = Response<BoxBody<Bytes, Infallible>>;

/// Bind `bind_addr` and serve until the task is aborted
pub async fn serve_metrics(bind_addr: String) -> Result<(), RautaError> {
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Metrics server listening on {}", bind_addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                debug!("Accepted metrics connection from {}", peer_addr);

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                        Ok::<_, Infallible>(handle_request(req.uri().path()))
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Metrics connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error on {}: {}", bind_addr, e);
            }
        }
    }
}

/// Route one request by path
pub fn handle_request(path: &str) -> HttpResponse {
    match path {
        "/metrics" => serve_metrics_endpoint(),
        "/healthz" => text_response(StatusCode::OK, "ok".to_string()),
        _ => text_response(StatusCode::NOT_FOUND, "not found".to_string()),
    }
}

fn serve_metrics_endpoint() -> HttpResponse {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();

    // Gather metrics from all registries
    let mut metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    metric_families.extend(rate_limiter_registry().gather());

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        );
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)).boxed());
    if let Ok(content_type) = encoder.format_type().parse::<hyper::header::HeaderValue>() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    response
}

fn text_response(status: StatusCode, body: String) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    *response.status_mut() = status;
    response
}
