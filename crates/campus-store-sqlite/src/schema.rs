//! SQL schema for the campus SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    location_name TEXT NOT NULL,
    latitude      REAL NOT NULL,
    longitude     REAL NOT NULL
);

-- Replaced as a whole whenever the owning subject is updated.
CREATE TABLE IF NOT EXISTS schedule_entries (
    subject_id TEXT    NOT NULL REFERENCES subjects(subject_id),
    position   INTEGER NOT NULL,
    day        TEXT    NOT NULL,   -- 'Monday' .. 'Sunday'
    time       TEXT    NOT NULL,   -- verbatim, e.g. '09:30' or '9:30 AM'
    PRIMARY KEY (subject_id, position)
);

-- Append-only. Several rows per subject and day are allowed.
CREATE TABLE IF NOT EXISTS attendance (
    attendance_id TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL REFERENCES subjects(subject_id),
    date          TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    status        TEXT NOT NULL    -- 'present' | 'absent'
);

CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    password_hash   TEXT NOT NULL,
    num_of_rides    INTEGER NOT NULL DEFAULT 0,
    total_km        REAL    NOT NULL DEFAULT 0,
    avg_speed       REAL    NOT NULL DEFAULT 0,
    calories_burned REAL    NOT NULL DEFAULT 0,
    created_at      TEXT    NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS posts (
    post_id     TEXT PRIMARY KEY,
    heading     TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS schedule_day_idx      ON schedule_entries(day);
CREATE INDEX IF NOT EXISTS attendance_subject_idx ON attendance(subject_id);
CREATE INDEX IF NOT EXISTS users_total_km_idx    ON users(total_km);
CREATE INDEX IF NOT EXISTS posts_created_idx     ON posts(created_at);

PRAGMA user_version = 1;
";
