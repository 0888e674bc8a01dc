//! [`SqliteStore`]: the SQLite implementation of [`CampusStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Row};
use uuid::Uuid;

use campus_core::{
  attendance::{Attendance, AttendanceView, NewAttendance},
  post::{NewPost, Post},
  schedule::Weekday,
  store::CampusStore,
  subject::{NewSubject, Subject},
  user::{NewUser, ProfileUpdate, RideStats, User},
};

use crate::{
  encode::{
    encode_dt, encode_status, encode_uuid, encode_weekday, RawAttendance,
    RawPost, RawScheduleEntry, RawSubject, RawUser,
  },
  schema::SCHEMA,
  Error, Result,
};

const SUBJECT_COLUMNS: &str =
  "s.subject_id, s.name, s.location_name, s.latitude, s.longitude";

const USER_COLUMNS: &str = "user_id, username, name, password_hash, \
  num_of_rides, total_km, avg_speed, calories_burned, created_at";

// ─── Row mapping ─────────────────────────────────────────────────────────────

fn subject_row(row: &Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id:    row.get(0)?,
    name:          row.get(1)?,
    location_name: row.get(2)?,
    latitude:      row.get(3)?,
    longitude:     row.get(4)?,
  })
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:         row.get(0)?,
    username:        row.get(1)?,
    name:            row.get(2)?,
    password_hash:   row.get(3)?,
    num_of_rides:    row.get(4)?,
    total_km:        row.get(5)?,
    avg_speed:       row.get(6)?,
    calories_burned: row.get(7)?,
    created_at:      row.get(8)?,
  })
}

fn post_row(row: &Row<'_>) -> rusqlite::Result<RawPost> {
  Ok(RawPost {
    post_id:     row.get(0)?,
    heading:     row.get(1)?,
    description: row.get(2)?,
    created_at:  row.get(3)?,
  })
}

/// Schedule rows for one subject, in position order.
fn schedule_rows(
  conn: &Connection,
  subject_id: &str,
) -> rusqlite::Result<Vec<RawScheduleEntry>> {
  let mut stmt = conn.prepare_cached(
    "SELECT day, time FROM schedule_entries
     WHERE subject_id = ?1 ORDER BY position",
  )?;
  stmt
    .query_map(rusqlite::params![subject_id], |row| {
      Ok(RawScheduleEntry { day: row.get(0)?, time: row.get(1)? })
    })?
    .collect()
}

/// Run a subject query and attach each row's schedule.
fn query_subjects<P: rusqlite::Params>(
  conn: &Connection,
  sql: &str,
  params: P,
) -> rusqlite::Result<Vec<(RawSubject, Vec<RawScheduleEntry>)>> {
  let mut stmt = conn.prepare(sql)?;
  let subjects = stmt
    .query_map(params, subject_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  subjects
    .into_iter()
    .map(|s| -> rusqlite::Result<_> {
      let schedule = schedule_rows(conn, &s.subject_id)?;
      Ok((s, schedule))
    })
    .collect()
}

fn insert_schedule(
  conn: &Connection,
  subject_id: &str,
  schedule: &[(String, String)],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "INSERT INTO schedule_entries (subject_id, position, day, time)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (position, (day, time)) in schedule.iter().enumerate() {
    stmt.execute(rusqlite::params![subject_id, position as i64, day, time])?;
  }
  Ok(())
}

fn is_constraint(e: &rusqlite::Error, extended_code: std::ffi::c_int) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.extended_code == extended_code
  )
}

fn assemble(rows: Vec<(RawSubject, Vec<RawScheduleEntry>)>) -> Result<Vec<Subject>> {
  rows
    .into_iter()
    .map(|(s, schedule)| s.into_subject(schedule))
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A campus store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Count of rows in `attendance`.
  #[cfg(any(test, feature = "test-util"))]
  pub async fn attendance_count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM attendance", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n as u64)
  }

  /// Count of rows in `users`.
  #[cfg(any(test, feature = "test-util"))]
  pub async fn user_count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n as u64)
  }

  /// Run raw SQL; lets tests seed columns the API never writes.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn user_where(&self, column: &'static str, value: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            rusqlite::params![value],
            user_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}

fn encode_schedule(input: &NewSubject) -> Vec<(String, String)> {
  input
    .schedule
    .iter()
    .map(|e| (encode_weekday(e.day), e.time.clone()))
    .collect()
}

// ─── CampusStore impl ────────────────────────────────────────────────────────

impl CampusStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    let subject = Subject {
      subject_id:    Uuid::new_v4(),
      name:          input.name.clone(),
      location_name: input.location_name.clone(),
      coordinates:   input.coordinates,
      schedule:      input.schedule.clone(),
    };

    let id_str   = encode_uuid(subject.subject_id);
    let name     = input.name.clone();
    let location = input.location_name.clone();
    let lat      = input.coordinates.latitude;
    let lon      = input.coordinates.longitude;
    let schedule = encode_schedule(&input);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO subjects (subject_id, name, location_name, latitude, longitude)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, location, lat, lon],
        )?;
        insert_schedule(&tx, &id_str, &schedule)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_subjects(
          conn,
          &format!("SELECT {SUBJECT_COLUMNS} FROM subjects s WHERE s.subject_id = ?1"),
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(assemble(rows)?.into_iter().next())
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let rows = self
      .conn
      .call(|conn| {
        Ok(query_subjects(
          conn,
          &format!("SELECT {SUBJECT_COLUMNS} FROM subjects s ORDER BY s.rowid"),
          [],
        )?)
      })
      .await?;

    assemble(rows)
  }

  async fn update_subject(&self, id: Uuid, input: NewSubject) -> Result<Option<Subject>> {
    let id_str   = encode_uuid(id);
    let name     = input.name.clone();
    let location = input.location_name.clone();
    let lat      = input.coordinates.latitude;
    let lon      = input.coordinates.longitude;
    let schedule = encode_schedule(&input);

    let found: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE subjects
           SET name = ?2, location_name = ?3, latitude = ?4, longitude = ?5
           WHERE subject_id = ?1",
          rusqlite::params![id_str, name, location, lat, lon],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        tx.execute(
          "DELETE FROM schedule_entries WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        insert_schedule(&tx, &id_str, &schedule)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(found.then(|| Subject {
      subject_id:    id,
      name:          input.name,
      location_name: input.location_name,
      coordinates:   input.coordinates,
      schedule:      input.schedule,
    }))
  }

  async fn subjects_scheduled_on(&self, days: &[Weekday]) -> Result<Vec<Subject>> {
    if days.is_empty() {
      return Ok(Vec::new());
    }

    let day_strs: Vec<String> = days.iter().copied().map(encode_weekday).collect();
    let placeholders = vec!["?"; day_strs.len()].join(", ");
    let sql = format!(
      "SELECT {SUBJECT_COLUMNS} FROM subjects s
       WHERE s.subject_id IN (
         SELECT subject_id FROM schedule_entries WHERE day IN ({placeholders})
       )
       ORDER BY s.rowid"
    );

    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_subjects(conn, &sql, rusqlite::params_from_iter(day_strs.iter()))?)
      })
      .await?;

    assemble(rows)
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn record_attendance(&self, input: NewAttendance) -> Result<Attendance> {
    let record = Attendance {
      attendance_id: Uuid::new_v4(),
      subject_id:    input.subject_id,
      date:          Utc::now(),
      status:        input.status,
    };

    let id_str      = encode_uuid(record.attendance_id);
    let subject_str = encode_uuid(record.subject_id);
    let date_str    = encode_dt(record.date);
    let status_str  = encode_status(record.status);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO attendance (attendance_id, subject_id, date, status)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, subject_str, date_str, status_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(campus_core::Error::SubjectNotFound(input.subject_id).into());
    }
    Ok(record)
  }

  async fn list_attendance(&self, subject_id: Option<Uuid>) -> Result<Vec<AttendanceView>> {
    let filter = subject_id.map(encode_uuid);

    let (raws, subjects): (Vec<RawAttendance>, Vec<(RawSubject, Vec<RawScheduleEntry>)>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT attendance_id, subject_id, date, status FROM attendance
           WHERE ?1 IS NULL OR subject_id = ?1
           ORDER BY rowid",
        )?;
        let raws = stmt
          .query_map(rusqlite::params![filter], |row| {
            Ok(RawAttendance {
              attendance_id: row.get(0)?,
              subject_id:    row.get(1)?,
              date:          row.get(2)?,
              status:        row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let subjects = query_subjects(
          conn,
          &format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects s
             WHERE s.subject_id IN (
               SELECT subject_id FROM attendance WHERE ?1 IS NULL OR subject_id = ?1
             )"
          ),
          rusqlite::params![filter],
        )?;

        Ok((raws, subjects))
      })
      .await?;

    let by_id: HashMap<Uuid, Subject> = assemble(subjects)?
      .into_iter()
      .map(|s| (s.subject_id, s))
      .collect();

    raws
      .into_iter()
      .map(|raw| -> Result<AttendanceView> {
        let record = raw.into_attendance()?;
        let subject = by_id
          .get(&record.subject_id)
          .cloned()
          .ok_or(campus_core::Error::SubjectNotFound(record.subject_id))?;
        Ok(AttendanceView { record, subject: subject.into() })
      })
      .collect()
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:       Uuid::new_v4(),
      username:      input.username,
      name:          input.name,
      password_hash: input.password_hash,
      stats:         RideStats::default(),
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let username = user.username.clone();
    let name     = user.name.clone();
    let hash     = user.password_hash.clone();
    let at_str   = encode_dt(user.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO users (user_id, username, name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, username, name, hash, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(campus_core::Error::UsernameTaken(user.username).into());
    }
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    self.user_where("user_id", encode_uuid(id)).await
  }

  async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
    self.user_where("username", username.to_owned()).await
  }

  async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<User>> {
    let id_str   = encode_uuid(id);
    let username = update.username.clone();
    let name     = update.name;

    // `None` = no such user, `Some(false)` = username conflict.
    let outcome: Option<bool> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "UPDATE users
           SET username = COALESCE(?2, username), name = COALESCE(?3, name)
           WHERE user_id = ?1",
          rusqlite::params![id_str, username, name],
        ) {
          Ok(0) => Ok(None),
          Ok(_) => Ok(Some(true)),
          Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            Ok(Some(false))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match outcome {
      None => Ok(None),
      Some(false) => Err(
        campus_core::Error::UsernameTaken(update.username.unwrap_or_default()).into(),
      ),
      Some(true) => self.get_user(id).await,
    }
  }

  async fn leaderboard(&self, limit: usize) -> Result<Vec<User>> {
    let limit_val = limit as i64;

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users ORDER BY total_km DESC, rowid LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], user_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    let post = Post {
      post_id:     Uuid::new_v4(),
      heading:     input.heading,
      description: input.description,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(post.post_id);
    let heading     = post.heading.clone();
    let description = post.description.clone();
    let at_str      = encode_dt(post.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (post_id, heading, description, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, heading, description, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
    let limit_val = limit as i64;

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT post_id, heading, description, created_at FROM posts
           ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], post_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }
}
