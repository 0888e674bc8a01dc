//! Attendance records and the mark-attendance operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  geofence::Geofence,
  store::CampusStore,
  subject::{Coordinates, SubjectSummary},
};

/// Outcome of a geofence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  Present,
  Absent,
}

impl AttendanceStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Present => "present",
      Self::Absent => "absent",
    }
  }
}

/// An immutable attendance record. Several records may exist for the same
/// subject and day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
  #[serde(rename = "id")]
  pub attendance_id: Uuid,
  pub subject_id:    Uuid,
  /// Server-assigned; never changes after creation.
  pub date:          DateTime<Utc>,
  pub status:        AttendanceStatus,
}

/// Input to [`CampusStore::record_attendance`]. The date is set by the store.
#[derive(Debug, Clone, Copy)]
pub struct NewAttendance {
  pub subject_id: Uuid,
  pub status:     AttendanceStatus,
}

/// An attendance record with its subject resolved, as listed by
/// [`CampusStore::list_attendance`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
  #[serde(flatten)]
  pub record:  Attendance,
  pub subject: SubjectSummary,
}

/// A record written by [`mark_attendance`] and the distance it was
/// classified from.
#[derive(Debug, Clone)]
pub struct Marked {
  pub record:     Attendance,
  pub distance_m: f64,
}

/// Classify `position` against the subject's coordinate and persist the
/// result.
///
/// Returns `Ok(None)` when the subject does not exist; nothing is written in
/// that case.
pub async fn mark_attendance<S: CampusStore>(
  store: &S,
  subject_id: Uuid,
  position: Coordinates,
  fence: &Geofence,
) -> Result<Option<Marked>, S::Error> {
  let Some(subject) = store.get_subject(subject_id).await? else {
    return Ok(None);
  };

  let (distance_m, status) = fence.evaluate(subject.coordinates, position);
  let record = store
    .record_attendance(NewAttendance { subject_id, status })
    .await?;

  Ok(Some(Marked { record, distance_m }))
}
