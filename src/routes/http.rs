//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures become a JSON `ErrorOut` via `ApiError`.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument, warn};

use crate::domain::{ChallengeId, NewChallenge};
use crate::error::CoreError;
use crate::logic;
use crate::notifications::NotificationSettings;
use crate::protocol::*;
use crate::rotation::ChallengeFilter;
use crate::state::AppState;
use crate::store::{ChallengeRepository, StoreError};

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self { Self(e) }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self { Self(CoreError::from(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      CoreError::NotFound(_) => StatusCode::NOT_FOUND,
      CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      CoreError::Persistence(_) | CoreError::InconsistentReset { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      error!(target: "fitchallenge_backend", error = %self.0, "Request failed");
    } else {
      warn!(target: "fitchallenge_backend", error = %self.0, "Request rejected");
    }
    let failed = match &self.0 {
      CoreError::InconsistentReset { failed, .. } => Some(failed.clone()),
      _ => None,
    };
    let body = ErrorOut { error: self.0.kind(), message: self.0.user_message(), failed };
    (status, Json(body)).into_response()
  }
}

type ApiResult<T> = Result<T, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_next_challenge(
  State(state): State<Arc<AppState>>,
  Query(q): Query<NextChallengeQuery>,
) -> ApiResult<Json<NextOut>> {
  let filter = ChallengeFilter { category: q.category, difficulty: q.difficulty };
  let picked = logic::next_challenge(&state, &filter)?;
  Ok(Json(NextOut { challenge: picked.as_ref().map(ChallengeOut::from) }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_challenges(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ChallengeListQuery>,
) -> ApiResult<Json<Vec<ChallengeOut>>> {
  let found = logic::list_challenges(&state, &q)?;
  Ok(Json(found.iter().map(ChallengeOut::from).collect()))
}

#[instrument(level = "info", skip(state, body), fields(name = %body.name))]
pub async fn http_create_challenge(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChallengeIn>,
) -> ApiResult<(StatusCode, Json<ChallengeOut>)> {
  let new = NewChallenge::from(body).validated()?;
  let created = state.challenges.create(&new)?;
  info!(target: "challenge", id = created.id, name = %created.name, "Challenge created");
  Ok((StatusCode::CREATED, Json(ChallengeOut::from(&created))))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<ChallengeId>,
) -> ApiResult<Json<ChallengeOut>> {
  let found = state.challenges.find_by_id(id)?.ok_or(CoreError::NotFound(id))?;
  Ok(Json(ChallengeOut::from(&found)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<ChallengeId>,
  Json(body): Json<ChallengeIn>,
) -> ApiResult<Json<ChallengeOut>> {
  let edit = NewChallenge::from(body).validated()?;
  if !state.challenges.update(id, &edit)? {
    return Err(CoreError::NotFound(id).into());
  }
  info!(target: "challenge", id, "Challenge updated");
  Ok(Json(ChallengeOut::from(&edit.with_id(id))))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<ChallengeId>,
) -> ApiResult<StatusCode> {
  if !state.challenges.delete(id)? {
    return Err(CoreError::NotFound(id).into());
  }
  info!(target: "challenge", id, "Challenge deleted");
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
  Ok(Json(state.challenges.categories()?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_completion(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CompletionIn>,
) -> ApiResult<(StatusCode, Json<ReceiptOut>)> {
  let (minutes, receipt) = logic::complete_challenge(&state, body.challenge_id, body.minutes, body.elapsed_seconds)?;
  let out = ReceiptOut {
    minutes,
    completion: CompletionOut::from(&receipt.completion),
    stats: StatsOut::from(&receipt.stats),
  };
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsOut>> {
  Ok(Json(StatsOut::from(&state.tracker.stats()?)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsOut>> {
  state.tracker.reset_stats()?;
  Ok(Json(StatsOut::from(&state.tracker.stats()?)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_application(State(state): State<Arc<AppState>>) -> ApiResult<Json<ResetOut>> {
  let reseeded = logic::reset_everything(&state)?;
  Ok(Json(ResetOut { ok: true, reseeded }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<CompletionOut>>> {
  let items = logic::history(&state, &q)?;
  Ok(Json(items.iter().map(CompletionOut::from).collect()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history_categories(
  State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<CategoryCountOut>>> {
  let counts = state.tracker.counts_by_category()?;
  Ok(Json(counts.into_iter().map(|(category, count)| CategoryCountOut { category, count }).collect()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history_daily(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<DailyOut>>> {
  Ok(Json(logic::daily(&state, &q)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_notifications(State(state): State<Arc<AppState>>) -> Json<NotificationSettings> {
  Json(state.notifications.current())
}

#[instrument(level = "info", skip(state))]
pub async fn http_put_notifications(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NotificationSettings>,
) -> ApiResult<Json<NotificationSettings>> {
  Ok(Json(state.notifications.update(body)?))
}
