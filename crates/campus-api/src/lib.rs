//! JSON REST API for the campus backend.
//!
//! Exposes an axum [`Router`] backed by any [`campus_core::store::CampusStore`].
//! TLS and process concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = campus_api::app(AppState::new(store, tokens, Geofence::default()));
//! axum::serve(listener, app).await?;
//! ```

pub mod attendance;
pub mod auth;
pub mod error;
pub mod posts;
pub mod subjects;
pub mod token;
pub mod users;


use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{FromRequest, FromRequestParts},
  http::{Method, header},
  routing::{get, post, put},
};
use campus_core::{geofence::Geofence, store::CampusStore};
use serde_json::{Value, json};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use error::ApiError;
pub use token::TokenSigner;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
#[derive(Clone)]
pub struct AppState<S: CampusStore> {
  pub store:  Arc<S>,
  pub tokens: Arc<TokenSigner>,
  pub fence:  Geofence,
}

impl<S: CampusStore> AppState<S> {
  pub fn new(store: Arc<S>, tokens: TokenSigner, fence: Geofence) -> Self {
    Self { store, tokens: Arc::new(tokens), fence }
  }
}

/// [`axum::Json`] whose rejections answer in the API's error shape.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// [`axum::extract::Path`] with JSON rejections.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// [`axum::extract::Query`] with JSON rejections.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API routes for `state`, relative to their mount point.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: CampusStore + Clone + 'static,
{
  Router::new()
    // Attendance
    .route("/attendance", get(attendance::list::<S>))
    .route("/attendance/mark", post(attendance::mark::<S>))
    // Subjects
    .route("/subjects", get(subjects::list::<S>))
    .route("/subjects/create", post(subjects::create::<S>))
    .route("/subjects/{id}", put(subjects::update::<S>))
    // Accounts
    .route("/auth/register", post(users::register::<S>))
    .route("/auth/login", post(users::login::<S>))
    .route(
      "/auth/profile/{user_id}",
      get(users::profile::<S>).put(users::update_profile::<S>),
    )
    .route("/auth/leaderboard", get(users::leaderboard::<S>))
    // Community
    .route("/posts", get(posts::list::<S>).post(posts::create::<S>))
    .route("/test", get(health))
    .with_state(state)
}

/// The complete application: routes under `/api`, request tracing and CORS.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: CampusStore + Clone + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
    .layer(cors())
}

fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// `GET /test`
async fn health() -> Json<Value> {
  Json(json!({ "message": "Backend is working!" }))
}
