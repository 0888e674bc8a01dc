//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order is chronological. UUIDs are stored as hyphenated
//! lowercase strings.

use campus_core::{
  attendance::{Attendance, AttendanceStatus},
  post::Post,
  schedule::{ScheduleEntry, Weekday},
  subject::{Coordinates, Subject},
  user::{RideStats, User},
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── AttendanceStatus ─────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "present" => Ok(AttendanceStatus::Present),
    "absent" => Ok(AttendanceStatus::Absent),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Weekday ──────────────────────────────────────────────────────────────────

pub fn encode_weekday(d: Weekday) -> String { d.to_string() }

pub fn decode_weekday(s: &str) -> Result<Weekday> { Ok(Weekday::parse(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:    String,
  pub name:          String,
  pub location_name: String,
  pub latitude:      f64,
  pub longitude:     f64,
}

/// Raw values read directly from a `schedule_entries` row.
pub struct RawScheduleEntry {
  pub day:  String,
  pub time: String,
}

impl RawScheduleEntry {
  pub fn into_entry(self) -> Result<ScheduleEntry> {
    Ok(ScheduleEntry { day: decode_weekday(&self.day)?, time: self.time })
  }
}

impl RawSubject {
  /// Assemble a subject from its row and its schedule rows, which must
  /// already be in position order.
  pub fn into_subject(self, schedule: Vec<RawScheduleEntry>) -> Result<Subject> {
    Ok(Subject {
      subject_id:    decode_uuid(&self.subject_id)?,
      name:          self.name,
      location_name: self.location_name,
      coordinates:   Coordinates::new(self.latitude, self.longitude),
      schedule:      schedule
        .into_iter()
        .map(RawScheduleEntry::into_entry)
        .collect::<Result<_>>()?,
    })
  }
}

/// Raw strings read directly from an `attendance` row.
pub struct RawAttendance {
  pub attendance_id: String,
  pub subject_id:    String,
  pub date:          String,
  pub status:        String,
}

impl RawAttendance {
  pub fn into_attendance(self) -> Result<Attendance> {
    Ok(Attendance {
      attendance_id: decode_uuid(&self.attendance_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      date:          decode_dt(&self.date)?,
      status:        decode_status(&self.status)?,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:         String,
  pub username:        String,
  pub name:            String,
  pub password_hash:   String,
  pub num_of_rides:    i64,
  pub total_km:        f64,
  pub avg_speed:       f64,
  pub calories_burned: f64,
  pub created_at:      String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      username:      self.username,
      name:          self.name,
      password_hash: self.password_hash,
      stats:         RideStats {
        num_of_rides:    self.num_of_rides,
        total_km:        self.total_km,
        avg_speed:       self.avg_speed,
        calories_burned: self.calories_burned,
      },
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub post_id:     String,
  pub heading:     String,
  pub description: String,
  pub created_at:  String,
}

impl RawPost {
  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:     decode_uuid(&self.post_id)?,
      heading:     self.heading,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
