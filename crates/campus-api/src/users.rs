//! Handlers for the `/auth` endpoints: accounts, profiles and the
//! leaderboard.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | 201 `{token, user}`; 409 on a taken username |
//! | `POST` | `/auth/login` | `{token, user}`; 401 on bad credentials |
//! | `GET`  | `/auth/profile/{userId}` | Full profile |
//! | `PUT`  | `/auth/profile/{userId}` | Bearer token for the same user |
//! | `GET`  | `/auth/leaderboard` | Top riders by distance |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use campus_core::{
  store::CampusStore,
  user::{LeaderboardEntry, NewUser, ProfileUpdate, User, UserProfile},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiJson, ApiPath, AppState,
  auth::{AuthUser, hash_password, verify_password},
  error::ApiError,
  subjects::non_empty,
};

/// Number of riders on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
  pub token: String,
  pub user:  UserProfile,
}

fn session<S>(state: &AppState<S>, user: &User) -> Result<Session, ApiError>
where
  S: CampusStore,
{
  let token = state
    .tokens
    .issue(user.user_id)
    .map_err(|e| ApiError::Internal(format!("token issue: {e}")))?;
  Ok(Session { token, user: UserProfile::summary(user) })
}

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: Option<String>,
  pub name:     Option<String>,
  pub password: Option<String>,
}

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let (Some(username), Some(name), Some(password)) = (
    non_empty(body.username),
    non_empty(body.name),
    body.password.filter(|p| !p.is_empty()),
  ) else {
    return Err(ApiError::missing_fields());
  };

  let password_hash = hash_password(password).await?;
  let user = state
    .store
    .create_user(NewUser { username, name, password_hash })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(user_id = %user.user_id, username = %user.username, "user registered");
  Ok((StatusCode::CREATED, Json(session(&state, &user)?)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: Option<String>,
  pub password: Option<String>,
}

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<Session>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let (Some(username), Some(password)) =
    (non_empty(body.username), body.password.filter(|p| !p.is_empty()))
  else {
    return Err(ApiError::missing_fields());
  };

  let user = state
    .store
    .find_user_by_username(&username)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.to_owned()))?;

  if !verify_password(password, user.password_hash.clone()).await? {
    tracing::debug!(username = %user.username, "login rejected");
    return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_owned()));
  }

  Ok(Json(session(&state, &user)?))
}

// ─── Profile ──────────────────────────────────────────────────────────────────

/// `GET /auth/profile/{userId}`
pub async fn profile<S>(
  State(state): State<AppState<S>>,
  ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let user = state
    .store
    .get_user(user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;
  Ok(Json(UserProfile::full(&user)))
}

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
  pub username: Option<String>,
  pub name:     Option<String>,
}

/// `PUT /auth/profile/{userId}`: blank fields are left unchanged.
pub async fn update_profile<S>(
  State(state): State<AppState<S>>,
  AuthUser(caller): AuthUser,
  ApiPath(user_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<ProfileBody>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  if caller != user_id {
    return Err(ApiError::Forbidden(
      "cannot modify another user's profile".to_owned(),
    ));
  }

  let update = ProfileUpdate {
    username: non_empty(body.username),
    name:     non_empty(body.name),
  };
  let user = state
    .store
    .update_profile(user_id, update)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;
  Ok(Json(UserProfile::summary(&user)))
}

// ─── Leaderboard ──────────────────────────────────────────────────────────────

/// `GET /auth/leaderboard`
pub async fn leaderboard<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError>
where
  S: CampusStore + Clone + 'static,
{
  let users = state
    .store
    .leaderboard(LEADERBOARD_SIZE)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(LeaderboardEntry::rank(&users)))
}
