//! Dashboard API route handlers.
//!
//! All endpoints return JSON except the export downloads. Board data is read
//! from the scheduler's published view; commands go through its handle.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::analytics::movers::favorites;
use crate::analytics::winners::{annotate_winners, RankedWinner};
use crate::analytics::{HorseFilter, RoundSummary};
use crate::engine::{ControlError, Controls, Notice, SchedulerHandle, TimerState};
use crate::export::{self, export_filename, CourseSelection, ExportFormat};
use crate::feed::{DateToken, FetchRequest};
use crate::storage::{PreferenceStore, ZOOM_KEY};
use crate::types::Favorite;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub scheduler: SchedulerHandle,
    pub preferences: RwLock<PreferenceStore>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(scheduler: SchedulerHandle, preferences: PreferenceStore) -> Self {
        Self {
            scheduler,
            preferences: RwLock::new(preferences),
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error body: `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let status = match err {
            ControlError::Busy | ControlError::TimerActive | ControlError::AlreadyActive => {
                StatusCode::CONFLICT
            }
            ControlError::InvalidInterval(_) => StatusCode::BAD_REQUEST,
            ControlError::SchedulerGone => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timer: &'static str,
    pub interval_minutes: Option<u32>,
    pub remaining_secs: u64,
    /// `m:ss`
    pub countdown: String,
    pub loading: Option<String>,
    pub controls: Controls,
    pub notice: Option<Notice>,
    pub board: Option<BoardSummary>,
    pub updates: u64,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub title: String,
    pub racecourses: usize,
    pub rounds: usize,
    pub winners: usize,
    pub fetched_at: DateTime<Utc>,
    pub source_timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRaces {
    pub name: String,
    pub rounds: Vec<RoundSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceResponse {
    pub key: String,
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CoursesQuery {
    pub courses: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerBody {
    pub interval_minutes: u32,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.scheduler.view();
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(StatusResponse {
        timer: match view.timer {
            TimerState::Idle => "idle",
            TimerState::Active { .. } => "active",
        },
        interval_minutes: view.timer.interval_minutes(),
        remaining_secs: view.remaining_secs,
        countdown: view.countdown_label(),
        loading: view.loading.map(|r| r.to_string()),
        controls: view.controls,
        notice: view.notice.clone(),
        board: view.board.as_ref().map(|b| BoardSummary {
            title: b.title.clone(),
            racecourses: b.racecourses.len(),
            rounds: b.round_count(),
            winners: b.winners.len(),
            fetched_at: b.fetched_at,
            source_timestamp: b.source_timestamp.clone(),
        }),
        updates: view.updates,
        uptime_secs: uptime,
    })
}

/// GET /api/racecourses
pub async fn get_racecourses(State(state): State<AppState>) -> Json<Vec<String>> {
    let names = state
        .scheduler
        .view()
        .board
        .map(|b| b.racecourses.iter().map(|rc| rc.name.clone()).collect())
        .unwrap_or_default();
    Json(names)
}

/// GET /api/races?courses=A,B&filter=1,3
pub async fn get_races(
    State(state): State<AppState>,
    Query(query): Query<CoursesQuery>,
) -> Json<Vec<CourseRaces>> {
    let Some(board) = state.scheduler.view().board else {
        return Json(Vec::new());
    };
    let selection = CourseSelection::from_query(query.courses.as_deref());
    let filter = HorseFilter::parse(query.filter.as_deref().unwrap_or_default());

    let courses = selection
        .apply(&board.racecourses)
        .iter()
        .map(|rc| CourseRaces {
            name: rc.name.clone(),
            rounds: rc
                .rounds
                .iter()
                .map(|round| RoundSummary::build(round, &filter))
                .collect(),
        })
        .collect();
    Json(courses)
}

/// GET /api/movers?courses=A,B
pub async fn get_movers(
    State(state): State<AppState>,
    Query(query): Query<CoursesQuery>,
) -> Json<Vec<Favorite>> {
    let movers = state
        .scheduler
        .view()
        .board
        .map(|b| {
            let selection = CourseSelection::from_query(query.courses.as_deref());
            favorites(&selection.apply(&b.racecourses))
        })
        .unwrap_or_default();
    Json(movers)
}

/// GET /api/winners
pub async fn get_winners(State(state): State<AppState>) -> Json<Vec<RankedWinner>> {
    let winners = state
        .scheduler
        .view()
        .board
        .map(|b| annotate_winners(&b.racecourses, &b.winners))
        .unwrap_or_default();
    Json(winners)
}

/// POST /api/refresh?date=today|tomorrow|YYYY-MM-DD
pub async fn post_refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<StatusCode> {
    let request = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => FetchRequest::AllRaces,
        Some(date) => {
            let token: DateToken = date
                .parse()
                .map_err(|e: anyhow::Error| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
            FetchRequest::Upcoming(token)
        }
    };
    state.scheduler.refresh(request).await?;
    info!(request = %request, "Refresh requested via dashboard");
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/winners/refresh
pub async fn post_winners_refresh(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.scheduler.refresh(FetchRequest::Winners).await?;
    info!("Winners refresh requested via dashboard");
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/timer/start
pub async fn post_timer_start(
    State(state): State<AppState>,
    Json(body): Json<StartTimerBody>,
) -> ApiResult<StatusCode> {
    state.scheduler.start(body.interval_minutes).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/timer/stop
pub async fn post_timer_stop(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.scheduler.stop().await?;
    Ok(StatusCode::OK)
}

/// GET /api/export/:format?courses=A,B
pub async fn get_export(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(query): Query<CoursesQuery>,
) -> ApiResult<Response> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: anyhow::Error| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    let board = state
        .scheduler
        .view()
        .board
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No race data loaded yet"))?;

    let selection = CourseSelection::from_query(query.courses.as_deref());
    let bytes = export::render(&board, &selection, format)?;
    let filename = export_filename(Utc::now(), format);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/preferences/:key
pub async fn get_preference(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<PreferenceResponse>> {
    let prefs = state.preferences.read().await;
    let value = if key == ZOOM_KEY {
        serde_json::json!(prefs.zoom_level())
    } else {
        prefs
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("No preference {key:?}")))?
    };
    Ok(Json(PreferenceResponse { key, value }))
}

/// PUT /api/preferences/:key
pub async fn put_preference(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> ApiResult<Json<PreferenceResponse>> {
    let mut prefs = state.preferences.write().await;
    let stored = if key == ZOOM_KEY {
        let zoom = value.as_f64().ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "zoom_level must be a number")
        })?;
        let zoom = prefs.set_zoom_level(zoom)?;
        serde_json::json!(zoom)
    } else {
        prefs.set(&key, value.clone())?;
        value
    };
    info!(key, "Preference updated via dashboard");
    Ok(Json(PreferenceResponse { key, value: stored }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_status_codes() {
        let status = |e: ControlError| ApiError::from(e).status;
        assert_eq!(status(ControlError::Busy), StatusCode::CONFLICT);
        assert_eq!(status(ControlError::TimerActive), StatusCode::CONFLICT);
        assert_eq!(status(ControlError::AlreadyActive), StatusCode::CONFLICT);
        assert_eq!(status(ControlError::InvalidInterval(0)), StatusCode::BAD_REQUEST);
        assert_eq!(status(ControlError::SchedulerGone), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_start_body_is_camel_case() {
        let body: StartTimerBody = serde_json::from_str(r#"{"intervalMinutes": 15}"#).unwrap();
        assert_eq!(body.interval_minutes, 15);
    }

    #[test]
    fn test_status_response_serializes() {
        let resp = StatusResponse {
            timer: "idle",
            interval_minutes: None,
            remaining_secs: 0,
            countdown: "0:00".into(),
            loading: None,
            controls: Controls::default(),
            notice: Some(Notice::NoData),
            board: None,
            updates: 0,
            uptime_secs: 5,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["timer"], "idle");
        assert_eq!(json["notice"]["kind"], "noData");
        assert_eq!(json["uptimeSecs"], 5);
    }
}
