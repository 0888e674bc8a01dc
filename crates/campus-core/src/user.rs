//! Riders: identity, credentials and cumulative ride statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cumulative ride statistics. Initialised to zero at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideStats {
  pub num_of_rides:    i64,
  pub total_km:        f64,
  pub avg_speed:       f64,
  pub calories_burned: f64,
}

/// A persisted user. `password_hash` never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
  pub user_id:       Uuid,
  pub username:      String,
  pub name:          String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub stats:         RideStats,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::CampusStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub name:          String,
  pub password_hash: String,
}

/// A partial profile change; `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
  pub username: Option<String>,
  pub name:     Option<String>,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id:         Uuid,
  pub username:   String,
  pub name:       String,
  pub stats:      RideStats,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
  /// The short form returned alongside a token.
  pub fn summary(user: &User) -> Self {
    Self {
      id:         user.user_id,
      username:   user.username.clone(),
      name:       user.name.clone(),
      stats:      user.stats,
      created_at: None,
    }
  }

  /// The full profile, including the registration time.
  pub fn full(user: &User) -> Self {
    Self { created_at: Some(user.created_at), ..Self::summary(user) }
  }
}

/// One row of the distance leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub id:           Uuid,
  /// 1-based position.
  pub rank:         usize,
  pub name:         String,
  pub username:     String,
  /// Total distance ridden, in kilometres.
  pub distance:     f64,
  pub num_of_rides: i64,
}

impl LeaderboardEntry {
  /// Rank users already sorted by descending distance.
  pub fn rank(users: &[User]) -> Vec<Self> {
    users
      .iter()
      .enumerate()
      .map(|(i, u)| Self {
        id:           u.user_id,
        rank:         i + 1,
        name:         u.name.clone(),
        username:     u.username.clone(),
        distance:     u.stats.total_km,
        num_of_rides: u.stats.num_of_rides,
      })
      .collect()
  }
}
