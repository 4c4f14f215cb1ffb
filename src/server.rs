//! HTTP serving layer
//!
//! A hyper accept loop dispatching on the request path: operational
//! endpoints (`/`, `/all`, `/healthz`, `/stats`, `/metrics`) plus one route
//! per registered platform handler. Every feed request runs under its own
//! deadline with a child cancellation token, so a timed-out request also
//! aborts any retry backoff it is sitting in.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::ErrorBody;
use crate::routes::Registry;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Deadline for handling one request
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6688,
            request_timeout: Duration::from_secs(30),
        }
    }
}

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hotboard_requests_total",
        "Total HTTP requests by path and status",
        &["path", "status"]
    )
    .expect("request counter registration")
});

/// Run the HTTP server until shutdown fires.
pub async fn run(
    config: ServerConfig,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, routes = registry.len(), "server listening");

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => {
                accepted.map_err(|e| Error::Internal(format!("accept error: {e}")))?
            }
            _ = shutdown.cancelled() => {
                info!("server accept loop stopped");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let registry = Arc::clone(&registry);
        let shutdown = shutdown.clone();
        let timeout = config.request_timeout;

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let registry = Arc::clone(&registry);
                let shutdown = shutdown.clone();
                async move { handle_request(registry, req, timeout, shutdown).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = %err, "connection error");
            }
        });
    }
}

async fn handle_request(
    registry: Arc<Registry>,
    req: Request<hyper::body::Incoming>,
    timeout: Duration,
    shutdown: CancellationToken,
) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let path = req.uri().path().to_string();
    let refresh = wants_refresh(req.uri().query());

    let response = match path.as_str() {
        "/" => json_response(
            StatusCode::OK,
            &json!({
                "code": 200,
                "message": "Hotboard aggregation gateway",
                "version": env!("CARGO_PKG_VERSION"),
                "routes": registry.paths(),
            }),
        ),
        "/healthz" | "/health" => json_response(
            StatusCode::OK,
            &json!({ "status": "healthy" }),
        ),
        "/stats" => json_response(
            StatusCode::OK,
            &json!({
                "code": 200,
                "stats": registry.fetcher().cache_stats(),
            }),
        ),
        "/all" => {
            let routes: Vec<_> = registry
                .paths()
                .into_iter()
                .map(|p| json!({ "name": p.trim_start_matches('/'), "path": p }))
                .collect();
            json_response(
                StatusCode::OK,
                &json!({ "code": 200, "count": routes.len(), "routes": routes }),
            )
        }
        "/metrics" => metrics_response(),
        _ => serve_feed(&registry, &path, refresh, timeout, &shutdown).await,
    };

    REQUESTS_TOTAL
        .with_label_values(&[path.as_str(), response.status().as_str()])
        .inc();

    Ok(response)
}

async fn serve_feed(
    registry: &Registry,
    path: &str,
    refresh: bool,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> Response<Full<Bytes>> {
    let cancel = shutdown.child_token();

    let outcome = tokio::time::timeout(timeout, registry.serve(path, refresh, cancel.clone())).await;

    match outcome {
        Ok(Ok(envelope)) => json_response(StatusCode::OK, &envelope),
        Ok(Err(err)) => {
            let status = err.status_code();
            if status >= 500 {
                error!(path, error = %err, "feed request failed");
            }
            error_response(status, &err.to_string())
        }
        Err(_) => {
            // Propagate the deadline into any backoff the fetch is waiting in.
            cancel.cancel();
            warn!(path, ?timeout, "feed request timed out");
            error_response(504, "request timed out")
        }
    }
}

fn wants_refresh(query: Option<&str>) -> bool {
    query
        .map(|q| q.split('&').any(|pair| pair == "cache=false"))
        .unwrap_or(false)
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let encoded = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    response_with(status, "application/json; charset=utf-8", encoded)
}

fn error_response(status: u16, message: &str) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorBody::new(status.as_u16(), message))
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "metrics encoding failed");
        return error_response(500, "metrics encoding failed");
    }
    response_with(StatusCode::OK, encoder.format_type(), buffer)
}

fn response_with(
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_refresh() {
        assert!(wants_refresh(Some("cache=false")));
        assert!(wants_refresh(Some("type=hot&cache=false")));
        assert!(!wants_refresh(Some("cache=true")));
        assert!(!wants_refresh(Some("cachex=false")));
        assert!(!wants_refresh(None));
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(404, "unknown route: /nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_status_falls_back_to_500() {
        let response = error_response(9999, "weird");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 6688);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
