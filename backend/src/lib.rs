use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::{Assignment, Matcher, Roster};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod auth;
pub mod config;
pub mod scores;
pub mod storage;

pub use config::Config;
use scores::{Leaderboards, ScoreEntry};

const SESSION_HEADER: &str = "x-session-token";

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    matcher: Arc<Matcher>,
    assignments: Arc<RwLock<Assignment>>,
    logins: Arc<RwLock<HashMap<String, String>>>,
    sessions: Arc<RwLock<HashMap<String, String>>>,
    scores: Arc<RwLock<Leaderboards>>,
}

impl AppState {
    pub async fn load(config: Config, roster: Roster) -> Self {
        let state = Self {
            matcher: Arc::new(Matcher::new(&roster)),
            assignments: Arc::new(RwLock::new(Assignment::new())),
            logins: Arc::new(RwLock::new(config.logins.clone())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            scores: Arc::new(RwLock::new(Leaderboards::default())),
            config: Arc::new(config),
        };
        if let Err(err) = tokio::fs::create_dir_all(&state.config.data_dir).await {
            tracing::warn!("could not create data dir: {err}");
        }
        state.reload_assignments().await;
        state.reload_scores().await;
        state
    }

    async fn reload_assignments(&self) {
        let path = match storage::ensure_match_file(&self.config.data_dir, self.config.year).await
        {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!("assignment lookup error: {err}");
                return;
            }
        };
        if let Ok(bytes) = tokio::fs::read(&path).await {
            match serde_json::from_slice::<Assignment>(&bytes) {
                Ok(saved) => *self.assignments.write().await = saved,
                Err(err) => {
                    tracing::warn!("ignoring malformed assignment file {}: {err}", path.display())
                }
            }
        }
    }

    async fn reload_scores(&self) {
        if let Ok(bytes) = tokio::fs::read(&self.config.scores_path).await {
            match serde_json::from_slice::<Leaderboards>(&bytes) {
                Ok(saved) => *self.scores.write().await = saved,
                Err(err) => tracing::warn!("ignoring malformed score store: {err}"),
            }
        }
    }

    async fn persist_scores(&self) {
        let snapshot = { self.scores.read().await.clone() };
        if let Ok(json) = serde_json::to_vec_pretty(&snapshot) {
            if let Err(err) = tokio::fs::write(&self.config.scores_path, json).await {
                tracing::warn!("score persist error: {err}");
            }
        }
    }

    async fn session_user(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers.get(SESSION_HEADER)?.to_str().ok()?;
        self.sessions.read().await.get(token).cloned()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route("/api/secret-santa", get(get_assignment))
        .route("/api/names", get(get_names))
        .route("/api/scores/:game", get(get_scores).post(submit_score))
        .route("/api/admin/run_matches", post(run_matches))
        .route("/api/admin/set_password", post(set_password))
        .route("/api/admin/reset_scores", post(reset_scores))
        .route(
            "/api/admin/snapshots",
            get(snapshots_index).post(snapshots_create),
        )
        .route("/api/admin/snapshots/restore", post(snapshots_restore))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    state
        .session_user(headers)
        .await
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "unauthorized"))
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let user = require_user(state, headers).await?;
    if user != state.config.admin_user {
        return Err(error_response(StatusCode::FORBIDDEN, "admin only"));
    }
    Ok(user)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Deserialize)]
struct LoginRequest {
    name: String,
    code: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    name: String,
    recipient: Option<String>,
    token: String,
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Response {
    let name = payload.name.trim().to_string();
    let stored = { state.logins.read().await.get(&name).cloned() };
    let valid = stored
        .map(|hash| auth::verify_passphrase(&hash, &payload.code))
        .unwrap_or(false);
    if !valid {
        return error_response(StatusCode::UNAUTHORIZED, "invalid credentials");
    }

    let token = Uuid::new_v4().to_string();
    state
        .sessions
        .write()
        .await
        .insert(token.clone(), name.clone());
    let recipient = state.assignments.read().await.get(&name).cloned();
    tracing::info!("{name} logged in");

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            name,
            recipient,
            token,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct RecipientResponse {
    recipient: Option<String>,
}

async fn get_assignment(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let recipient = state.assignments.read().await.get(&user).cloned();
    (StatusCode::OK, Json(RecipientResponse { recipient })).into_response()
}

#[derive(Serialize)]
struct NamesResponse {
    names: Vec<String>,
}

async fn get_names(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match require_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let names = state.matcher.eligible_names(&user);
    (StatusCode::OK, Json(NamesResponse { names })).into_response()
}

#[derive(Deserialize)]
struct DrawParams {
    seed: Option<u64>,
}

#[derive(Serialize)]
struct DrawResponse {
    success: bool,
    year: i32,
}

async fn run_matches(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DrawParams>,
) -> Response {
    let user = match require_admin(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    if state.config.draw_locked {
        return error_response(StatusCode::FORBIDDEN, "the draw is locked");
    }

    let drawn = match params.seed {
        Some(seed) => state
            .matcher
            .draw_with_rng(&mut ChaCha8Rng::seed_from_u64(seed)),
        None => state.matcher.draw(),
    };
    let assignment = match drawn {
        Ok(assignment) => assignment,
        Err(err) => {
            let status = if err.is_configuration() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::CONFLICT
            };
            return error_response(status, &err.to_string());
        }
    };

    // Persist before swapping the in-memory assignment; a failed draw or a
    // failed write must leave the previous assignment readable.
    let path = storage::match_file_path(&state.config.data_dir, state.config.year);
    let json = match serde_json::to_vec_pretty(&assignment) {
        Ok(json) => json,
        Err(err) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };
    if let Err(err) = tokio::fs::write(&path, json).await {
        tracing::warn!("assignment persist error: {err}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "could not save assignment",
        );
    }
    *state.assignments.write().await = assignment;
    tracing::info!(year = state.config.year, "{user} ran a new draw");

    (
        StatusCode::OK,
        Json(DrawResponse {
            success: true,
            year: state.config.year,
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct SetPasswordRequest {
    name: String,
    passphrase: String,
}

#[derive(Serialize)]
struct OkResponse {
    success: bool,
}

async fn set_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SetPasswordRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers).await {
        return resp;
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() || payload.passphrase.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name and passphrase required");
    }

    let hash = auth::hash_passphrase(&payload.passphrase);
    state.logins.write().await.insert(name.clone(), hash.clone());
    if let Some(env_file) = &state.config.env_file {
        if let Err(err) = auth::write_login(env_file, &name, &hash).await {
            tracing::warn!("login persist error: {err}");
        }
    }
    tracing::info!("passphrase updated for {name}");

    (StatusCode::OK, Json(OkResponse { success: true })).into_response()
}

#[derive(Serialize)]
struct ScoresResponse {
    scores: Vec<ScoreEntry>,
}

async fn get_scores(State(state): State<AppState>, Path(game): Path<String>) -> Response {
    let scores = state.scores.read().await.top(&game);
    (StatusCode::OK, Json(ScoresResponse { scores })).into_response()
}

#[derive(Deserialize)]
struct ScoreRequest {
    name: String,
    score: i64,
}

async fn submit_score(
    State(state): State<AppState>,
    Path(game): Path<String>,
    Json(payload): Json<ScoreRequest>,
) -> Response {
    let name = payload.name.trim();
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name required");
    }
    state.scores.write().await.submit(&game, name, payload.score);
    state.persist_scores().await;
    (StatusCode::OK, Json(OkResponse { success: true })).into_response()
}

#[derive(Deserialize)]
struct ResetScoresRequest {
    game: String,
}

async fn reset_scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetScoresRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers).await {
        return resp;
    }
    state.scores.write().await.reset(&payload.game);
    state.persist_scores().await;
    tracing::info!("scores reset for {}", payload.game);
    (StatusCode::OK, Json(OkResponse { success: true })).into_response()
}

#[derive(Serialize)]
struct SnapshotsResponse {
    snapshots: Vec<String>,
}

async fn snapshots_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_admin(&state, &headers).await {
        return resp;
    }
    match storage::list_snapshots(&state.config.data_dir).await {
        Ok(snapshots) => {
            (StatusCode::OK, Json(SnapshotsResponse { snapshots })).into_response()
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

#[derive(Serialize)]
struct SnapshotCreatedResponse {
    success: bool,
    snapshot: String,
}

async fn snapshots_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_admin(&state, &headers).await {
        return resp;
    }
    let created = storage::create_snapshot(
        &state.config.data_dir,
        state.config.env_file.as_deref(),
        &state.config.scores_path,
    )
    .await;
    match created {
        Ok(snapshot) => {
            tracing::info!("snapshot {snapshot} created");
            (
                StatusCode::OK,
                Json(SnapshotCreatedResponse {
                    success: true,
                    snapshot,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

#[derive(Deserialize)]
struct RestoreRequest {
    name: String,
}

async fn snapshots_restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RestoreRequest>,
) -> Response {
    if let Err(resp) = require_admin(&state, &headers).await {
        return resp;
    }
    match storage::restore_snapshot(&state.config.data_dir, &payload.name).await {
        Ok(()) => {
            state.reload_assignments().await;
            state.reload_scores().await;
            tracing::info!("snapshot {} restored", payload.name);
            (StatusCode::OK, Json(OkResponse { success: true })).into_response()
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, &err.to_string())
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}
