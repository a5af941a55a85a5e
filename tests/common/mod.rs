//! In-process agreement service for integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// How the fake service answers.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub fetch_status: u16,
    pub fetch_body: String,
    pub fetch_delay: Duration,
    /// Number of initial fetches answered with 503
    pub fail_first: usize,
    pub action_status: u16,
}

impl MockBehavior {
    pub fn json(body: serde_json::Value) -> Self {
        Self::raw(body.to_string())
    }

    pub fn raw(body: impl Into<String>) -> Self {
        Self {
            fetch_status: 200,
            fetch_body: body.into(),
            fetch_delay: Duration::ZERO,
            fail_first: 0,
            action_status: 200,
        }
    }
}

/// Everything the fake service saw.
pub struct MockState {
    behavior: MockBehavior,
    fetch_hits: AtomicUsize,
    fetch_params: Mutex<Vec<HashMap<String, String>>>,
    actions: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockState {
    pub fn fetch_hits(&self) -> usize {
        self.fetch_hits.load(Ordering::SeqCst)
    }

    pub fn fetch_params(&self) -> Vec<HashMap<String, String>> {
        self.fetch_params.lock().clone()
    }

    pub fn actions(&self) -> Vec<(String, serde_json::Value)> {
        self.actions.lock().clone()
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Agreement endpoint URL.
    pub fn route(&self) -> String {
        format!("http://{}/api", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn fetch(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let hit = state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    state.fetch_params.lock().push(params);

    if !state.behavior.fetch_delay.is_zero() {
        tokio::time::sleep(state.behavior.fetch_delay).await;
    }
    if hit < state.behavior.fail_first {
        return (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string());
    }

    let status = StatusCode::from_u16(state.behavior.fetch_status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, state.behavior.fetch_body.clone())
}

async fn action(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    state.actions.lock().push((id, body));
    let status = StatusCode::from_u16(state.behavior.action_status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "{}".to_string())
}

/// Start the fake service on a random port.
pub async fn start(behavior: MockBehavior) -> MockServer {
    let state = Arc::new(MockState {
        behavior,
        fetch_hits: AtomicUsize::new(0),
        fetch_params: Mutex::new(Vec::new()),
        actions: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/api", get(fetch))
        .route("/api/:id", post(action))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to read local addr");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    MockServer {
        addr,
        state,
        shutdown: Some(shutdown_tx),
    }
}

/// Payload from the reference scenario: id 42, English title and body.
pub fn sample_payload(id: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": id,
            "name": "Privacy",
            "title": [{"language": "en", "content": "T"}],
            "description": [{"language": "en", "content": "D"}],
            "force": false,
            "agreement_title": [{"language": "en", "content": "Please review"}],
            "accept_button_title": [{"language": "en", "content": "I agree"}],
            "decline_button_title": [],
            "version": 1,
            "sdk_version": "0.1.0",
            "created_at": "2024-05-01T10:00:00Z"
        }
    })
}
