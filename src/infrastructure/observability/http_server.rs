//! HTTP Observability Server
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text format
//! - `GET /health` - health with book and event totals
//! - `GET /health/ready` - readiness probe
//! - `GET /health/live` - liveness probe
//! - `GET /books` - resting depth per market (read locks only)
//!
//! ## Usage
//! ```rust,ignore
//! let server = ObservabilityServer::new(9090, service.books().clone(), service.health().clone());
//! tokio::spawn(server.run());
//! ```

use crate::application::services::{BookRegistry, MarketDepth};
use crate::shared::health::{HealthChecker, HealthDetails, HealthStatus};
use crate::shared::metrics::METRICS;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::core::Collector;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    health: Arc<HealthChecker>,
    books: Arc<BookRegistry>,
}

pub struct ObservabilityServer {
    addr: SocketAddr,
    state: AppState,
}

impl ObservabilityServer {
    /// Serves `books` and the state `health` is fed by the orchestrator
    pub fn new(port: u16, books: Arc<BookRegistry>, health: Arc<HealthChecker>) -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            state: AppState { health, books },
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/health/live", get(liveness_handler))
            .route("/books", get(books_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> std::io::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "observability server listening");
        axum::serve(listener, app).await
    }
}

async fn metrics_handler() -> Response {
    (StatusCode::OK, METRICS.export()).into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let depths = state.books.snapshot();
    let details = HealthDetails {
        markets: depths.len(),
        resting_requests: depths.iter().map(|d| d.depth.requests).sum(),
        resting_offers: depths.iter().map(|d| d.depth.offers).sum(),
        events_handled: counter_total(&METRICS.events_total),
        matches: counter_total(&METRICS.matches_total),
    };
    let response = state.health.check_health(Some(details));

    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response)).into_response()
}

async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.check_readiness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn liveness_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.check_liveness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn books_handler(State(state): State<AppState>) -> Json<Vec<MarketDepth>> {
    Json(state.books.snapshot())
}

/// Sum of a labelled counter across all label values
fn counter_total(counter: &prometheus::CounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_counter().get_value())
        .sum::<f64>() as u64
}
