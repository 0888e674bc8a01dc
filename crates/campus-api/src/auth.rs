//! Password hashing and the bearer-token extractor.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use campus_core::store::CampusStore;
use rand_core::OsRng;
use uuid::Uuid;

use crate::{AppState, error::ApiError, token::TokenSigner};

/// Hash `password` into a PHC string on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
  tokio::task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| ApiError::Internal(format!("password hashing: {e}")))
  })
  .await
  .map_err(|e| ApiError::Internal(format!("hashing task: {e}")))?
}

/// `false` for a wrong password or an unparseable stored hash.
pub async fn verify_password(password: String, phc: String) -> Result<bool, ApiError> {
  tokio::task::spawn_blocking(move || {
    let Ok(parsed) = PasswordHash::new(&phc) else {
      tracing::warn!("stored password hash is not a valid PHC string");
      return false;
    };
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
  .await
  .map_err(|e| ApiError::Internal(format!("verification task: {e}")))
}

/// The user a request was authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Resolve `Authorization: Bearer <token>` to a user id.
pub fn verify_bearer(
  headers: &HeaderMap,
  tokens: &TokenSigner,
) -> Result<AuthUser, ApiError> {
  let token = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))?;

  let claims = tokens.verify(token.trim()).map_err(|e| {
    tracing::debug!(error = %e, "rejected bearer token");
    ApiError::Unauthorized("invalid or expired token".to_owned())
  })?;
  Ok(AuthUser(claims.sub))
}

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
  S: CampusStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(&parts.headers, &state.tokens)
  }
}
