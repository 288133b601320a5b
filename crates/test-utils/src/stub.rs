//! In-process stub of an inference server.
//!
//! Accepts the JSON bodies the load tester sends on `/infer`, `/answer` and
//! `/v1/completions`, waits a fixed delay, and answers with a configurable
//! status. It counts requests and records the peak number of requests it was
//! serving at the same time.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Behaviour of a [`StubBackend`].
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Time spent "generating" before replying.
    pub delay: Duration,
    /// Status returned for inference requests.
    pub status: u16,
    /// Every n-th request (1-based) fails with 500 regardless of `status`.
    pub fail_every: Option<u64>,
    /// Whether `GET /health` answers 200.
    pub healthy: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            status: 200,
            fail_every: None,
            healthy: true,
        }
    }
}

impl StubConfig {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct StubStats {
    requests: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

#[derive(Clone)]
struct StubState {
    config: StubConfig,
    stats: Arc<StubStats>,
}

/// Decrements the in-flight count even when the client hangs up early.
struct InFlightGuard(Arc<StubStats>);

impl InFlightGuard {
    fn enter(stats: Arc<StubStats>) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(stats)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running stub server bound to `127.0.0.1` on a random port.
pub struct StubBackend {
    addr: SocketAddr,
    stats: Arc<StubStats>,
    handle: JoinHandle<()>,
}

impl StubBackend {
    /// Bind and start serving in the background.
    pub async fn spawn(config: StubConfig) -> Self {
        let stats = Arc::new(StubStats::default());
        let state = StubState {
            config,
            stats: stats.clone(),
        };

        let app = Router::new()
            .route("/infer", post(infer))
            .route("/answer", post(infer))
            .route("/v1/completions", post(infer))
            .route("/health", get(health))
            .with_state(state);

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("failed to bind stub backend");
        let addr = listener.local_addr().expect("stub backend has no address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            stats,
            handle,
        }
    }

    /// Full URL for `path` on this server, e.g. `url("/infer")`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Inference requests received so far.
    pub fn requests(&self) -> u64 {
        self.stats.requests.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of inference requests served at once.
    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Body of the most recent inference request.
    pub fn last_body(&self) -> Option<Value> {
        self.stats
            .bodies
            .lock()
            .ok()
            .and_then(|bodies| bodies.last().cloned())
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn infer(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let _guard = InFlightGuard::enter(state.stats.clone());
    let seq = state.stats.requests.fetch_add(1, Ordering::SeqCst) + 1;
    if let Ok(mut bodies) = state.stats.bodies.lock() {
        bodies.push(body);
    }

    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }

    let forced_failure = state
        .config
        .fail_every
        .map(|every| every > 0 && seq % every == 0)
        .unwrap_or(false);
    let status = if forced_failure {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::from_u16(state.config.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };

    (
        status,
        Json(json!({
            "text": "stub completion",
            "latency_sec": state.config.delay.as_secs_f64(),
        })),
    )
}

async fn health(State(state): State<StubState>) -> (StatusCode, Json<Value>) {
    if state.config.healthy {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false })))
    }
}
