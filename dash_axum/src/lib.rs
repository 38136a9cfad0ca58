pub mod page;

use axum::{
    Json, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
};
use serde_json::json;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use widgetkit::WidgetRegistry;
use widgetkit::context::REQUEST_ID_HEADER;

pub use page::{DEFAULT_TRIGGER, dashboard_page};

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Heading and `<title>` of the dashboard page.
    pub title: String,
    /// Deadline for a whole request, widget fetches included.
    pub request_timeout: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            title: "Dashboard".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the service: dashboard page at `/`, one route per registered
/// widget under `/widgets/{key}`, `/health`, and a 404 fallback, wrapped in
/// the request id, tracing, compression, timeout and security header layers.
pub fn router(registry: &WidgetRegistry, options: &RouterOptions) -> Router {
    let page = dashboard_page(&options.title, registry.list());

    let mut app = Router::new()
        .route("/", get(move || async move { Html(page) }))
        .route("/health", get(health));

    for spec in registry.list() {
        app = app.route(&spec.endpoint(), spec.route.clone());
    }

    let mut app = app.fallback(not_found);

    for (name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Set up a trace layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        })
        .on_request(|request: &Request<Body>, _: &tracing::Span| {
            tracing::info!(
                "received request: {method} {uri}",
                method = request.method(),
                uri = request.uri()
            );
        });

    // layers run outermost-last: the request id is assigned before tracing
    // sees the request and before widget handlers read it
    app.layer(TimeoutLayer::with_status_code(
        StatusCode::GATEWAY_TIMEOUT,
        options.request_timeout,
    ))
    .layer(CompressionLayer::new().gzip(true).deflate(true))
    .layer(PropagateRequestIdLayer::new(request_id.clone()))
    .layer(trace_layer)
    .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Serve `app` on `addr` until Ctrl+C or SIGTERM, then drain in-flight
/// requests.
///
/// # Errors
///
/// Returns an error if the listener cannot bind to `addr` or the server
/// fails while running.
pub async fn run_app(app: Router, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "starting_server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server_stopped");
    Ok(())
}

#[tracing::instrument]
async fn health() -> impl IntoResponse {
    tracing::debug!("health check");

    Json(json!({ "status" : "UP" }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::warn!("signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
