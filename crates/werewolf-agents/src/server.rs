//! HTTP control surface over a [`MatchRegistry`].
//!
//! ```text
//! GET    /                          service index
//! POST   /games        {seed?}      create a match        → 201
//! GET    /games                     list matches
//! GET    /games/{id}                public snapshot
//! GET    /games/{id}/status         status
//! GET    /games/{id}/seats/{seat}   one seat's view
//! POST   /games/{id}/step           advance one phase
//! POST   /games/{id}/run            run to completion
//! DELETE /games/{id}                dispose              → 204
//! ```
//!
//! Errors are JSON bodies `{code, message, details}`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use moderator::{MatchError, MatchSnapshot, MatchStatus, SeatId, SeatView, StepReport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::sessions::{MatchId, MatchRegistry, MatchSummary, RunReport, SessionError};

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MatchNotFound,
    SeatNotFound,
    MatchFinished,
    InvalidRequest,
    ConfigurationDefect,
    AgentFailure,
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn match_not_found(requested: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::MatchNotFound,
                "no match with this id",
                Some(format!("match_id={requested}")),
            ),
        }
    }

    fn seat_not_found(id: &str, seat: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::SeatNotFound,
                "no such seat in this match",
                Some(format!("match_id={id} seat={seat}")),
            ),
        }
    }

    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }

    fn internal(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new(code, message, details),
        }
    }

    fn from_session(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => Self::match_not_found(&id.to_string()),
            SessionError::UnknownSeat { id, seat } => {
                Self::seat_not_found(&id.to_string(), &seat.to_string())
            }
            SessionError::Match(MatchError::AlreadyFinished { round }) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::MatchFinished,
                    "match is already finished",
                    Some(format!("round={round}")),
                ),
            },
            SessionError::Match(e) if e.is_configuration_defect() => Self::internal(
                ErrorCode::ConfigurationDefect,
                "match configuration is broken",
                Some(e.to_string()),
            ),
            SessionError::Match(e @ MatchError::Agent(_)) => Self::internal(
                ErrorCode::AgentFailure,
                "agent failed; match left at its last committed phase",
                Some(e.to_string()),
            ),
            SessionError::Match(e) => Self::internal(
                ErrorCode::InternalError,
                "phase failed; match left at its last committed phase",
                Some(e.to_string()),
            ),
            SessionError::Setup(e) => Self::internal(
                ErrorCode::ConfigurationDefect,
                "match could not be created",
                Some(format!("{e:#}")),
            ),
        }
    }
}

impl From<SessionError> for HttpApiError {
    fn from(err: SessionError) -> Self {
        Self::from_session(err)
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

// ─── State and routing ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    registry: Arc<MatchRegistry>,
}

pub fn router(registry: Arc<MatchRegistry>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/games", post(create_match).get(list_matches))
        .route("/games/{id}", get(get_match).delete(dispose_match))
        .route("/games/{id}/status", get(get_status))
        .route("/games/{id}/seats/{seat}", get(get_seat))
        .route("/games/{id}/step", post(step_match))
        .route("/games/{id}/run", post(run_match))
        .with_state(AppState { registry })
}

pub async fn serve(addr: SocketAddr, registry: Arc<MatchRegistry>) -> Result<()> {
    let app = router(registry);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Werewolf server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_id(raw: &str) -> Result<MatchId, HttpApiError> {
    raw.parse().map_err(|_| HttpApiError::match_not_found(raw))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn index() -> Json<Value> {
    Json(json!({
        "name": "werewolf-moderator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /games": "create a match",
            "GET /games": "list matches",
            "GET /games/{id}": "public snapshot of a match",
            "GET /games/{id}/status": "match status",
            "GET /games/{id}/seats/{seat}": "what one seat knows",
            "POST /games/{id}/step": "advance one phase",
            "POST /games/{id}/run": "run to completion",
            "DELETE /games/{id}": "dispose of a match",
        },
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateMatchRequest {
    seed: Option<u64>,
}

async fn create_match(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MatchSummary>), HttpApiError> {
    let request: CreateMatchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateMatchRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            HttpApiError::invalid_request("request body must be {\"seed\": u64?}", Some(e.to_string()))
        })?
    };
    let summary = state.registry.create(request.seed).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[derive(Debug, Serialize)]
struct MatchList {
    games: Vec<MatchSummary>,
}

async fn list_matches(State(state): State<AppState>) -> Json<MatchList> {
    Json(MatchList {
        games: state.registry.list().await,
    })
}

#[derive(Debug, Serialize)]
struct MatchDetail {
    id: MatchId,
    seed: u64,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: MatchSnapshot,
}

async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchDetail>, HttpApiError> {
    let id = parse_id(&id)?;
    let summary = state.registry.summary(id).await?;
    let snapshot = state.registry.snapshot(id).await?;
    Ok(Json(MatchDetail {
        id,
        seed: summary.seed,
        created_at: summary.created_at,
        snapshot,
    }))
}

async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchStatus>, HttpApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.registry.status(id).await?))
}

async fn get_seat(
    State(state): State<AppState>,
    Path((id, seat)): Path<(String, String)>,
) -> Result<Json<SeatView>, HttpApiError> {
    let match_id = parse_id(&id)?;
    let seat_id: SeatId = seat
        .parse()
        .map_err(|_| HttpApiError::seat_not_found(&id, &seat))?;
    Ok(Json(state.registry.seat_view(match_id, seat_id).await?))
}

async fn step_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StepReport>, HttpApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.registry.advance(id).await?))
}

async fn run_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunReport>, HttpApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.registry.run(id).await?))
}

async fn dispose_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpApiError> {
    let id = parse_id(&id)?;
    state.registry.dispose(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MatchFactory;
    use crate::config::{default_seating, AgentBackend, GameConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use moderator::Phase;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = GameConfig {
            seating_plan: default_seating(),
            max_rounds: 10,
            seed: None,
            agent: AgentBackend::Rule,
            prompts_dir: None,
            chat: None,
        };
        let factory = MatchFactory::new(&config).unwrap();
        router(Arc::new(MatchRegistry::new(factory)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|err| panic!("failed to build request: {err}"));
        let response = app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|err| panic!("router request failed: {err}"));
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024)
            .await
            .unwrap_or_else(|err| panic!("failed to read body: {err}"));
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|err| panic!("body is not JSON: {err}"))
        };
        (status, value)
    }

    async fn create(app: &Router, seed: u64) -> String {
        let (status, body) = send(app, "POST", "/games", &format!("{{\"seed\": {seed}}}")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["seed"], seed);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let app = test_router();
        let (status, body) = send(&app, "GET", "/", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["POST /games/{id}/step"].is_string());
    }

    #[tokio::test]
    async fn create_without_body_draws_a_seed() {
        let app = test_router();
        let (status, body) = send(&app, "POST", "/games", "").await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["seed"].is_u64());
        assert_eq!(body["phase"], "night");

        let (status, list) = send(&app, "GET", "/games", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["games"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_malformed_body() {
        let app = test_router();
        let (status, body) = send(&app, "POST", "/games", "{\"seed\": \"x\"}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
    }

    #[tokio::test]
    async fn step_then_run_then_conflict() {
        let app = test_router();
        let id = create(&app, 42).await;

        let (status, step) = send(&app, "POST", &format!("/games/{id}/step"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(step["executed"], "night");

        let (_, status_body) = send(&app, "GET", &format!("/games/{id}/status"), "").await;
        let phase: Phase = serde_json::from_value(status_body["phase"].clone()).unwrap();
        assert_eq!(phase, Phase::Daybreak);

        let (status, run) = send(&app, "POST", &format!("/games/{id}/run"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["status"]["finished"], true);

        let (status, err) = send(&app, "POST", &format!("/games/{id}/step"), "").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "match_finished");

        let (status, _) = send(&app, "POST", &format!("/games/{id}/run"), "").await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Roles are public once the match is over.
        let (status, detail) = send(&app, "GET", &format!("/games/{id}"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(detail["seats"].as_array().unwrap().iter().all(|s| s["role"].is_string()));
    }

    #[tokio::test]
    async fn unknown_match_and_seat_are_404() {
        let app = test_router();
        let missing = uuid::Uuid::new_v4();
        let (status, err) = send(&app, "GET", &format!("/games/{missing}/status"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "match_not_found");

        let (status, _) = send(&app, "POST", "/games/not-a-uuid/step", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = create(&app, 1).await;
        let (status, err) = send(&app, "GET", &format!("/games/{id}/seats/9"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "seat_not_found");

        let (status, view) = send(&app, "GET", &format!("/games/{id}/seats/3"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["role"], "witch");
        assert!(view["table"].as_array().unwrap().iter().all(|s| s.get("role").is_none()));
    }

    #[tokio::test]
    async fn dispose_removes_match() {
        let app = test_router();
        let id = create(&app, 5).await;
        let (status, _) = send(&app, "DELETE", &format!("/games/{id}"), "").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/games/{id}"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/games/{id}"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
