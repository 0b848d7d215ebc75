//! Minimal axum service with request tracking installed.
//!
//! Run with `cargo run --example tracked_service`, then:
//! ```text
//! curl -i http://127.0.0.1:3000/orders/42
//! curl -i http://127.0.0.1:3000/orders/42 -H 'x-request-id: my-trace-1'
//! curl -i http://127.0.0.1:3000/health/live   # excluded from tracking
//! ```

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use request_tracking::{CorrelationIdLayer, LoggingSink, TrackingConfig, TrackingLayer};
use tracing_subscriber::EnvFilter;

async fn get_order(Path(id): Path<u64>) -> (StatusCode, String) {
    (StatusCode::OK, format!("order {id}"))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = TrackingConfig::ignoring_path_prefixes(["/health"])
        .with_enricher(|parts| vec![("path".to_string(), parts.uri.path().to_string())]);

    let app = Router::new()
        .route("/orders/{id}", get(get_order))
        .route("/health/live", get(health))
        .layer(TrackingLayer::with_config(LoggingSink::new(), config))
        .layer(CorrelationIdLayer::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(address = %listener.local_addr()?, "Demo server starting");
    axum::serve(listener, app).await
}
