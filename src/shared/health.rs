//! Health Check
//!
//! Health state of the matching process for load balancers and monitoring.
//! The orchestrator reports each store and mirror call; the status is derived
//! from the latest outcome of each collaborator:
//! - store failing: `unhealthy` (not ready)
//! - mirror failing: `degraded` (still ready, matching is unaffected)
//!
//! ## Endpoints
//! - `/health` - status plus book and event totals
//! - `/health/ready` - ready to accept events
//! - `/health/live` - process is running
//!
//! ## Response format
//! ```json
//! {
//!   "status": "healthy",
//!   "uptime_seconds": 3600,
//!   "version": "0.1.0",
//!   "timestamp": 1714557600,
//!   "details": { "markets": 3, "resting_requests": 12, "resting_offers": 4,
//!                "events_handled": 1024, "matches": 310 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Events are handled but the mirror is failing
    Degraded,
    /// The durable store is failing
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub version: String,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub markets: usize,
    pub resting_requests: usize,
    pub resting_offers: usize,
    pub events_handled: u64,
    pub matches: u64,
}

#[derive(Debug)]
pub struct HealthChecker {
    started: Instant,
    version: String,
    store_failing: AtomicBool,
    mirror_failing: AtomicBool,
}

impl HealthChecker {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            version: version.into(),
            store_failing: AtomicBool::new(false),
            mirror_failing: AtomicBool::new(false),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Outcome of the latest durable store call
    pub fn record_store(&self, ok: bool) {
        let was_failing = self.store_failing.swap(!ok, Ordering::AcqRel);
        match (was_failing, ok) {
            (false, false) => warn!("store failing, reporting unhealthy"),
            (true, true) => info!("store recovered"),
            _ => {}
        }
    }

    /// Outcome of the latest mirror call
    pub fn record_mirror(&self, ok: bool) {
        let was_failing = self.mirror_failing.swap(!ok, Ordering::AcqRel);
        match (was_failing, ok) {
            (false, false) => warn!("mirror failing, reporting degraded"),
            (true, true) => info!("mirror recovered"),
            _ => {}
        }
    }

    pub fn get_status(&self) -> HealthStatus {
        if self.store_failing.load(Ordering::Acquire) {
            HealthStatus::Unhealthy
        } else if self.mirror_failing.load(Ordering::Acquire) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn check_health(&self, details: Option<HealthDetails>) -> HealthResponse {
        HealthResponse {
            status: self.get_status(),
            uptime_seconds: self.uptime_seconds(),
            version: self.version.clone(),
            timestamp: chrono::Utc::now().timestamp(),
            details,
        }
    }

    /// Liveness probe: answering at all means alive
    pub fn check_liveness(&self) -> bool {
        true
    }

    /// Readiness probe: a degraded mirror does not stop matching
    pub fn check_readiness(&self) -> bool {
        !matches!(self.get_status(), HealthStatus::Unhealthy)
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}
