//! Subjects: a schedulable class or session with a fixed location and a
//! weekly recurrence.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::ScheduleEntry;

/// A point on the Earth's surface in decimal degrees.
///
/// Values are taken as reported; no range or precision checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinates {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude }
  }
}

/// A persisted subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
  #[serde(rename = "id")]
  pub subject_id:    Uuid,
  pub name:          String,
  /// Human-readable location, e.g. "Engineering Block, Room 204".
  pub location_name: String,
  pub coordinates:   Coordinates,
  /// Weekly recurrence, in the order the entries were supplied.
  pub schedule:      Vec<ScheduleEntry>,
}

/// Input to [`crate::store::CampusStore::create_subject`] and
/// [`crate::store::CampusStore::update_subject`]. Updates replace the whole
/// record, schedule included.
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub name:          String,
  pub location_name: String,
  pub coordinates:   Coordinates,
  pub schedule:      Vec<ScheduleEntry>,
}

/// The subject fields embedded in an attendance listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
  #[serde(rename = "id")]
  pub subject_id:    Uuid,
  pub name:          String,
  pub location_name: String,
  pub schedule:      Vec<ScheduleEntry>,
}

impl From<Subject> for SubjectSummary {
  fn from(s: Subject) -> Self {
    Self {
      subject_id:    s.subject_id,
      name:          s.name,
      location_name: s.location_name,
      schedule:      s.schedule,
    }
  }
}
