// src/api.rs
//! Admin HTTP surface over the job store.

use std::sync::{Arc, RwLock};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::digest::{self, DigestItem};
use crate::metrics::Metrics;
use crate::pipeline::recompute_scores;
use crate::scoring::Weights;
use crate::store::{JobStore, StoreStats};

pub type SharedStore = Arc<RwLock<Box<dyn JobStore>>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub digest_size: usize,
}

impl AppState {
    pub fn new(store: Box<dyn JobStore>, digest_size: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            digest_size,
        }
    }
}

pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/digest", get(digest_preview))
        .route("/stats", get(stats))
        .route("/admin/recompute", post(admin_recompute))
        .with_state(state);
    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}

fn lock_poisoned() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "store lock poisoned").into_response()
}

#[derive(Deserialize)]
struct DigestQuery {
    n: Option<usize>,
}

async fn digest_preview(State(state): State<AppState>, Query(q): Query<DigestQuery>) -> Response {
    let Ok(store) = state.store.read() else {
        return lock_poisoned();
    };
    let picked = digest::select(&store.all(), q.n.unwrap_or(state.digest_size));
    Json::<Vec<DigestItem>>(digest::items(&picked)).into_response()
}

async fn stats(State(state): State<AppState>) -> Response {
    let Ok(store) = state.store.read() else {
        return lock_poisoned();
    };
    Json::<StoreStats>(store.stats()).into_response()
}

#[derive(Serialize)]
struct RecomputeOut {
    records: usize,
    money: f64,
    passion: f64,
    location: f64,
}

async fn admin_recompute(State(state): State<AppState>, Json(weights): Json<Weights>) -> Response {
    let Ok(mut store) = state.store.write() else {
        return lock_poisoned();
    };
    let records = match recompute_scores(&mut **store, &weights) {
        Ok(n) => n,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "store flush after recompute failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    let w = weights.normalized().unwrap_or_default();
    Json(RecomputeOut {
        records,
        money: w.money(),
        passion: w.passion(),
        location: w.location(),
    })
    .into_response()
}
