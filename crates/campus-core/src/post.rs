//! Community posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of posts returned by the community feed.
pub const FEED_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  #[serde(rename = "id")]
  pub post_id:     Uuid,
  pub heading:     String,
  pub description: String,
  /// Server-assigned; never changes after creation.
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
  pub heading:     String,
  pub description: String,
}
