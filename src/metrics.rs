use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dropwatch_poll_loop::metrics as poll_metrics;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        poll_metrics::register_metrics(global_registry());
    });
}

/// Serves `/metrics` on the loopback interface. Port 0 disables the endpoint.
pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(global_registry().clone()));
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    Some(tokio::spawn(serve_metrics(addr, app)))
}

async fn serve_metrics(addr: SocketAddr, app: Router) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, ?err, "metrics endpoint unavailable");
            return;
        }
    };
    info!(%addr, "metrics server listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(?err, "metrics server stopped");
    }
}

/// Current metrics in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    let body = String::from_utf8(buffer)
        .map_err(|err| prometheus::Error::Msg(format!("metrics are not utf8: {err}")))?;
    Ok((encoder.format_type().to_string(), body))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let (format_type, body) = match render(&registry) {
        Ok(rendered) => rendered,
        Err(err) => {
            error!(?err, "failed to encode prometheus metrics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response();
        }
    };

    match HeaderValue::from_str(&format_type) {
        Ok(value) => ([(header::CONTENT_TYPE, value)], body).into_response(),
        Err(err) => {
            error!(?err, "failed to build content-type header");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
