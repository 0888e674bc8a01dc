//! Handlers for `/attendance` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance/mark` | Geofence check against the subject's coordinate |
//! | `GET`  | `/attendance` | Optional `?subjectId=<uuid>` |

use axum::{
  Json,
  extract::State,
};
use campus_core::{
  attendance::{AttendanceStatus, AttendanceView, mark_attendance},
  store::CampusStore,
  subject::Coordinates,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiJson, ApiQuery, AppState, error::ApiError};

// ─── Mark ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkBody {
  pub subject_id: Option<Uuid>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkResponse {
  pub message:  String,
  pub status:   AttendanceStatus,
  /// Metres between the reported position and the subject.
  pub distance: f64,
}

/// `POST /attendance/mark`
pub async fn mark<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<MarkBody>,
) -> Result<Json<MarkResponse>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let (Some(subject_id), Some(latitude), Some(longitude)) =
    (body.subject_id, body.latitude, body.longitude)
  else {
    return Err(ApiError::missing_fields());
  };

  let marked = mark_attendance(
    state.store.as_ref(),
    subject_id,
    Coordinates::new(latitude, longitude),
    &state.fence,
  )
  .await
  .map_err(ApiError::store)?
  .ok_or_else(|| ApiError::NotFound(format!("subject {subject_id} not found")))?;

  let status = marked.record.status;
  tracing::info!(
    %subject_id,
    status = status.as_str(),
    distance_m = marked.distance_m,
    "attendance marked"
  );

  Ok(Json(MarkResponse {
    message: format!("Attendance marked as {}", status.as_str()),
    status,
    distance: marked.distance_m,
  }))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub subject_id: Option<Uuid>,
}

/// `GET /attendance[?subjectId=<uuid>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<AttendanceView>>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let records = state
    .store
    .list_attendance(params.subject_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
