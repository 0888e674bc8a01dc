//! Handlers for the `/posts` community feed.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use campus_core::{
  post::{FEED_LIMIT, NewPost, Post},
  store::CampusStore,
};
use serde::Deserialize;

use crate::{ApiJson, AppState, error::ApiError};

/// `GET /posts`: newest first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Post>>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let posts = state
    .store
    .recent_posts(FEED_LIMIT)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub heading:     Option<String>,
  pub description: Option<String>,
}

/// `POST /posts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let (Some(heading), Some(description)) = (
    body.heading.filter(|h| !h.trim().is_empty()),
    body.description.filter(|d| !d.trim().is_empty()),
  ) else {
    return Err(ApiError::missing_fields());
  };

  let post = state
    .store
    .create_post(NewPost { heading, description })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(post)))
}
