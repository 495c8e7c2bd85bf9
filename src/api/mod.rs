//! HTTP intake layer
//!
//! Turns inbound requests into jobs and polls stored results. Handlers
//! check `admission_open()` before submitting and surface a distinct
//! "shutting down" status once shutdown has begun; they never block on job
//! execution.
//!
//! Routes:
//! - `POST /api/<task>` for the nine aggregation tasks - body
//!   `{"question": ..., "state": ...?}`, reply `{"job_id": n}`
//! - `GET /api/get_results/{job_id}` - done/running/error status
//! - `GET /api/jobs` - done/running status for every id handed out
//! - `GET /api/num_jobs` - active job count
//! - `GET /api/graceful_shutdown` - drain and stop accepting jobs
//! - `GET /` and `GET /index` - plain listing of the defined routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::{JobEngine, JobKind, JobParams};
use crate::store::ResultStore;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<JobEngine>,
    pub store: Arc<dyn ResultStore>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub question: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Route table, also rendered by the index page
const ROUTES: &[(&str, &str)] = &[
    ("POST", "/api/states_mean"),
    ("POST", "/api/state_mean"),
    ("POST", "/api/best5"),
    ("POST", "/api/worst5"),
    ("POST", "/api/global_mean"),
    ("POST", "/api/diff_from_mean"),
    ("POST", "/api/state_diff_from_mean"),
    ("POST", "/api/mean_by_category"),
    ("POST", "/api/state_mean_by_category"),
    ("GET", "/api/get_results/{job_id}"),
    ("GET", "/api/jobs"),
    ("GET", "/api/num_jobs"),
    ("GET", "/api/graceful_shutdown"),
];

/// Build the axum router with every endpoint mounted
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index", get(index))
        .route("/api/states_mean", post(states_mean))
        .route("/api/state_mean", post(state_mean))
        .route("/api/best5", post(best5))
        .route("/api/worst5", post(worst5))
        .route("/api/global_mean", post(global_mean))
        .route("/api/diff_from_mean", post(diff_from_mean))
        .route("/api/state_diff_from_mean", post(state_diff_from_mean))
        .route("/api/mean_by_category", post(mean_by_category))
        .route("/api/state_mean_by_category", post(state_mean_by_category))
        .route("/api/get_results/{job_id}", get(get_results))
        .route("/api/jobs", get(jobs))
        .route("/api/num_jobs", get(num_jobs))
        .route("/api/graceful_shutdown", get(graceful_shutdown))
        .with_state(state)
}

fn shutting_down() -> Json<Value> {
    Json(json!({"status": "error", "reason": "shutting down"}))
}

/// Shared submit path for the nine task endpoints
fn submit_job(state: &ApiState, kind: JobKind, body: SubmitBody) -> Json<Value> {
    if kind.requires_state() && body.state.is_none() {
        return Json(json!({
            "status": "error",
            "reason": "missing state parameter"
        }));
    }

    if !state.engine.admission_open() {
        return shutting_down();
    }

    let params = JobParams {
        question: body.question,
        state: body.state,
    };

    match state.engine.submit(kind, params) {
        Some(job_id) => Json(json!({"job_id": job_id})),
        // Shutdown raced us between the admission check and the submit
        None => shutting_down(),
    }
}

macro_rules! submit_handler {
    ($name:ident, $kind:expr) => {
        async fn $name(
            State(state): State<ApiState>,
            Json(body): Json<SubmitBody>,
        ) -> Json<Value> {
            submit_job(&state, $kind, body)
        }
    };
}

submit_handler!(states_mean, JobKind::StatesMean);
submit_handler!(state_mean, JobKind::StateMean);
submit_handler!(best5, JobKind::Best5);
submit_handler!(worst5, JobKind::Worst5);
submit_handler!(global_mean, JobKind::GlobalMean);
submit_handler!(diff_from_mean, JobKind::DiffFromMean);
submit_handler!(state_diff_from_mean, JobKind::StateDiffFromMean);
submit_handler!(mean_by_category, JobKind::MeanByCategory);
submit_handler!(state_mean_by_category, JobKind::StateMeanByCategory);

/// GET /api/get_results/{job_id}
async fn get_results(State(state): State<ApiState>, Path(job_id): Path<String>) -> Json<Value> {
    let invalid = || Json(json!({"status": "error", "reason": "Invalid job id"}));

    let id = match job_id.parse::<u64>() {
        Ok(id) => id,
        Err(_) => return invalid(),
    };
    if id < 1 || id > state.engine.last_job_id() {
        return invalid();
    }

    if !state.store.has(id) {
        return Json(json!({"status": "running"}));
    }

    match state.store.get(id) {
        Ok(Some(data)) => Json(json!({"status": "done", "data": data})),
        Ok(None) => Json(json!({"status": "running"})),
        Err(err) => {
            log::error!("failed to read result {}: {}", id, err);
            Json(json!({"status": "error", "reason": "result unavailable"}))
        }
    }
}

/// GET /api/jobs
async fn jobs(State(state): State<ApiState>) -> Json<Value> {
    let mut data = serde_json::Map::new();
    for id in 1..=state.engine.last_job_id() {
        let status = if state.store.has(id) { "done" } else { "running" };
        data.insert(format!("job_id_{}", id), json!({"status": status}));
    }
    Json(json!({"status": "done", "data": data}))
}

/// GET /api/num_jobs
async fn num_jobs(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({"data": state.engine.active_job_count()}))
}

/// GET /api/graceful_shutdown
async fn graceful_shutdown(State(state): State<ApiState>) -> Json<Value> {
    state.engine.shutdown();

    if state.engine.active_job_count() == 0 {
        Json(json!({"status": "done"}))
    } else {
        Json(json!({"status": "running"}))
    }
}

/// GET / and GET /index
async fn index() -> Html<String> {
    let mut page = String::from(
        "Hello, World!\n Interact with the webserver using one of the defined routes:\n",
    );
    for (method, path) in ROUTES {
        page.push_str(&format!(
            "<p>Endpoint: \"{}\" Methods: \"{}\"</p>",
            path, method
        ));
    }
    Html(page)
}
