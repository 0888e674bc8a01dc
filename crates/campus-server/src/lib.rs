//! Process-level pieces of the campus backend: configuration, the schedule
//! poller and its HTTP notifier. `main.rs` wires them to the API router.

pub mod notify;
pub mod poller;

use std::{path::PathBuf, time::Duration};

use campus_core::{geofence::Geofence, schedule::ScheduleMatcher};
use config::{ConfigBuilder, ConfigError, builder::DefaultState};
use serde::{Deserialize, Serialize};

/// Environment variables with this prefix override the config file,
/// e.g. `CAMPUS_PORT=8080`.
pub const ENV_PREFIX: &str = "CAMPUS";

/// Upper bound for `token_ttl_days` (ten years).
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Upper bound for `max_catch_up_minutes` (one day).
pub const MAX_CATCH_UP_MINUTES: i64 = 24 * 60;

// ─── Configuration ────────────────────────────────────────────────────────────

/// How the poller decides that a schedule entry is due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
  #[default]
  Window,
  Exact,
}

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                 String,
  #[serde(default = "defaults::port")]
  pub port:                 u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:           PathBuf,
  /// HMAC secret for bearer tokens. Required.
  pub jwt_secret:           String,
  #[serde(default = "defaults::token_ttl_days")]
  pub token_ttl_days:       i64,
  #[serde(default = "defaults::geofence_radius_m")]
  pub geofence_radius_m:    f64,
  #[serde(default = "defaults::poll_interval_secs")]
  pub poll_interval_secs:   u64,
  #[serde(default)]
  pub match_mode:           MatchMode,
  #[serde(default = "defaults::exact_format")]
  pub exact_format:         String,
  #[serde(default = "defaults::max_catch_up_minutes")]
  pub max_catch_up_minutes: i64,
  /// Where check-in notifications are POSTed. The poller is off when unset.
  #[serde(default)]
  pub notify_url:           Option<String>,
  #[serde(default = "defaults::notify_timeout_secs")]
  pub notify_timeout_secs:  u64,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "0.0.0.0".to_owned() }
  pub fn port() -> u16 { 5000 }
  pub fn store_path() -> PathBuf { PathBuf::from("campus.db") }
  pub fn token_ttl_days() -> i64 { 7 }
  pub fn geofence_radius_m() -> f64 { campus_core::geofence::DEFAULT_RADIUS_M }
  pub fn poll_interval_secs() -> u64 { 60 }
  pub fn exact_format() -> String {
    campus_core::schedule::DEFAULT_EXACT_FORMAT.to_owned()
  }
  pub fn max_catch_up_minutes() -> i64 { 5 }
  pub fn notify_timeout_secs() -> u64 { 10 }
}

impl ServerConfig {
  /// Layer `path` (optional) under `CAMPUS_*` environment variables.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path.into()).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX)),
    )
  }

  pub fn from_builder(
    builder: ConfigBuilder<DefaultState>,
  ) -> Result<Self, ConfigError> {
    let cfg: Self = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.jwt_secret.trim().is_empty() {
      return Err(ConfigError::Message("jwt_secret must not be empty".into()));
    }
    if !(self.geofence_radius_m.is_finite() && self.geofence_radius_m > 0.0) {
      return Err(ConfigError::Message(
        "geofence_radius_m must be a positive number".into(),
      ));
    }
    if self.poll_interval_secs == 0 {
      return Err(ConfigError::Message(
        "poll_interval_secs must be at least 1".into(),
      ));
    }
    if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.token_ttl_days) {
      return Err(ConfigError::Message(format!(
        "token_ttl_days must be between 1 and {MAX_TOKEN_TTL_DAYS}"
      )));
    }
    if !(1..=MAX_CATCH_UP_MINUTES).contains(&self.max_catch_up_minutes) {
      return Err(ConfigError::Message(format!(
        "max_catch_up_minutes must be between 1 and {MAX_CATCH_UP_MINUTES}"
      )));
    }
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn geofence(&self) -> Geofence { Geofence::new(self.geofence_radius_m) }

  pub fn token_ttl(&self) -> chrono::Duration {
    chrono::Duration::days(self.token_ttl_days)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  pub fn notify_timeout(&self) -> Duration {
    Duration::from_secs(self.notify_timeout_secs)
  }

  pub fn max_catch_up(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.max_catch_up_minutes)
  }

  pub fn matcher(&self) -> ScheduleMatcher {
    match self.match_mode {
      MatchMode::Window => ScheduleMatcher::Window,
      MatchMode::Exact => {
        ScheduleMatcher::Exact { format: self.exact_format.clone() }
      }
    }
  }

  /// A copy that is safe to print.
  pub fn redacted(&self) -> Self {
    Self { jwt_secret: "<redacted>".to_owned(), ..self.clone() }
  }
}
