//! The `CampusStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `campus-store-sqlite`).
//! Higher layers (`campus-api`, `campus-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attendance::{Attendance, AttendanceView, NewAttendance},
  post::{NewPost, Post},
  schedule::Weekday,
  subject::{NewSubject, Subject},
  user::{NewUser, ProfileUpdate, User},
};

/// Backend errors must say whether they carry a domain error, so callers can
/// tell a conflict from an infrastructure failure without knowing the
/// backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_core(&self) -> Option<&crate::Error>;
}

/// Abstraction over a campus store backend.
///
/// Attendance records and posts are append-only. Subjects are replaced
/// wholesale on update. Users only change through [`Self::update_profile`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CampusStore: Send + Sync {
  type Error: StoreError;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn create_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by UUID. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Replace every field of an existing subject. Returns `None` if not found.
  fn update_subject(
    &self,
    id: Uuid,
    input: NewSubject,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Subjects with at least one schedule entry on any of `days`. This is a
  /// coarse filter; time-of-day matching happens in the caller.
  fn subjects_scheduled_on<'a>(
    &'a self,
    days: &'a [Weekday],
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  // ── Attendance (append-only) ──────────────────────────────────────────

  /// Persist a record dated now. The subject must exist.
  fn record_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<Attendance, Self::Error>> + Send + '_;

  /// All records, oldest first, with their subjects resolved. Optionally
  /// restricted to one subject.
  fn list_attendance(
    &self,
    subject_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<AttendanceView>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Fails with [`crate::Error::UsernameTaken`] if the username exists.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Apply a partial profile change. Returns `None` if the user does not
  /// exist; fails with [`crate::Error::UsernameTaken`] if the new username
  /// belongs to someone else.
  fn update_profile(
    &self,
    id: Uuid,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Users ordered by descending total distance, at most `limit` of them.
  fn leaderboard(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Posts (append-only) ───────────────────────────────────────────────

  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Newest first, at most `limit`.
  fn recent_posts(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;
}
