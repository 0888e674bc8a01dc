//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subjects/create` | 201 with the stored subject |
//! | `GET`  | `/subjects` | Insertion order |
//! | `PUT`  | `/subjects/{id}` | Replaces every field; 404 if not found |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use campus_core::{
  schedule::{ScheduleEntry, parse_time_of_day},
  store::CampusStore,
  subject::{Coordinates, NewSubject, Subject},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiJson, ApiPath, AppState, error::ApiError};

// ─── Body ─────────────────────────────────────────────────────────────────────

/// Shared by create and update. Every field is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBody {
  pub name:          Option<String>,
  pub location_name: Option<String>,
  pub coordinates:   Option<Coordinates>,
  pub schedule:      Option<Vec<ScheduleEntry>>,
}

impl SubjectBody {
  fn validate(self) -> Result<NewSubject, ApiError> {
    let name = non_empty(self.name).ok_or_else(ApiError::missing_fields)?;
    let location_name =
      non_empty(self.location_name).ok_or_else(ApiError::missing_fields)?;
    let coordinates = self.coordinates.ok_or_else(ApiError::missing_fields)?;
    let schedule = self.schedule.ok_or_else(ApiError::missing_fields)?;

    for entry in &schedule {
      parse_time_of_day(&entry.time)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    Ok(NewSubject { name, location_name, coordinates, schedule })
  }
}

/// Trimmed value, or `None` if absent or blank.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects/create`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<SubjectBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let input = body.validate()?;
  let subject = state
    .store
    .create_subject(input)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(subject_id = %subject.subject_id, name = %subject.name, "subject created");
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let subjects = state.store.list_subjects().await.map_err(ApiError::store)?;
  Ok(Json(subjects))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /subjects/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<SubjectBody>,
) -> Result<Json<Subject>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let input = body.validate()?;
  let subject = state
    .store
    .update_subject(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}
