//! Weekly schedules and the rules deciding which entries are due on a poller
//! tick.
//!
//! Stored schedule times are free-form strings (`"09:30"`, `"9:30 AM"`). Two
//! matching policies are supported:
//!
//! - [`ScheduleMatcher::Window`] parses each time to a minute of the day and
//!   fires it when that minute falls inside the tick's [`TickWindow`]. Every
//!   wall-clock minute belongs to exactly one window, so the result does not
//!   depend on where inside a minute the tick happens to land.
//! - [`ScheduleMatcher::Exact`] compares the stored string with the current
//!   time rendered through a format string. A tick only matches if it lands
//!   in the same minute the string names; there is no tolerance.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::{Error, Result, subject::Subject};

/// Format used by [`ScheduleMatcher::Exact`] unless configured otherwise,
/// e.g. `9:05 AM`.
pub const DEFAULT_EXACT_FORMAT: &str = "%-I:%M %p";

/// Accepted spellings of a stored time of day, tried in order.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p"];

// ─── Weekday ─────────────────────────────────────────────────────────────────

/// A day of the week, spelled the way schedules store it (`"Monday"`).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
pub enum Weekday {
  Monday,
  Tuesday,
  Wednesday,
  Thursday,
  Friday,
  Saturday,
  Sunday,
}

impl Weekday {
  /// The weekday a calendar date falls on.
  pub fn of(date: NaiveDate) -> Self { date.weekday().into() }

  /// Parse a stored day name; exact, case-sensitive.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::InvalidWeekday(s.to_owned()))
  }
}

impl From<chrono::Weekday> for Weekday {
  fn from(d: chrono::Weekday) -> Self {
    match d {
      chrono::Weekday::Mon => Self::Monday,
      chrono::Weekday::Tue => Self::Tuesday,
      chrono::Weekday::Wed => Self::Wednesday,
      chrono::Weekday::Thu => Self::Thursday,
      chrono::Weekday::Fri => Self::Friday,
      chrono::Weekday::Sat => Self::Saturday,
      chrono::Weekday::Sun => Self::Sunday,
    }
  }
}

// ─── Schedule entries ────────────────────────────────────────────────────────

/// One weekly occurrence of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub day:  Weekday,
  /// The time as entered; kept verbatim so exact matching sees what the
  /// author typed.
  pub time: String,
}

impl ScheduleEntry {
  pub fn new(day: Weekday, time: impl Into<String>) -> Self {
    Self { day, time: time.into() }
  }

  pub fn time_of_day(&self) -> Result<NaiveTime> {
    parse_time_of_day(&self.time)
  }
}

/// Parse `HH:mm`, `HH:mm:ss`, `h:mm AM` or `h:mm:ss PM` (meridiem in any
/// case). Seconds are dropped.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
  let trimmed = s.trim();
  TIME_FORMATS
    .iter()
    .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
    .and_then(|t| t.with_second(0))
    .ok_or_else(|| Error::InvalidTime(s.to_owned()))
}

fn floor_minute(t: NaiveDateTime) -> NaiveDateTime {
  t.with_second(0)
    .and_then(|t| t.with_nanosecond(0))
    .unwrap_or(t)
}

// ─── Tick windows ────────────────────────────────────────────────────────────

/// The span of wall-clock minutes one poller tick is responsible for:
/// every minute `m` with `after < m <= until`. Both bounds sit on a minute
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
  pub after: NaiveDateTime,
  pub until: NaiveDateTime,
}

impl TickWindow {
  /// A window covering only the minute `now` falls in.
  pub fn current_minute(now: NaiveDateTime) -> Self {
    let until = floor_minute(now);
    Self { after: until - Duration::minutes(1), until }
  }

  /// The window following one that ended at `previous`. At most
  /// `max_catch_up` worth of minutes is covered. A clock that moved
  /// backwards yields an empty window that stays at `previous`, so minutes
  /// already covered are not covered again once the clock recovers.
  pub fn following(
    previous: NaiveDateTime,
    now: NaiveDateTime,
    max_catch_up: Duration,
  ) -> Self {
    let previous = floor_minute(previous);
    let until = floor_minute(now).max(previous);
    let floor = until
      .checked_sub_signed(max_catch_up.max(Duration::minutes(1)))
      .unwrap_or(NaiveDateTime::MIN);
    let after = previous.max(floor).min(until);
    Self { after, until }
  }

  pub fn is_empty(&self) -> bool { self.after >= self.until }

  pub fn contains(&self, t: NaiveDateTime) -> bool {
    let t = floor_minute(t);
    self.after < t && t <= self.until
  }

  /// Calendar dates touched by the window, oldest first.
  pub fn dates(&self) -> Vec<NaiveDate> {
    if self.is_empty() {
      return Vec::new();
    }
    let first = (self.after + Duration::minutes(1)).date();
    first
      .iter_days()
      .take_while(|d| *d <= self.until.date())
      .collect()
  }
}

/// Everything a matcher needs to know about one poller tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
  /// Local wall-clock time at which the tick ran.
  pub now:    NaiveDateTime,
  pub window: TickWindow,
}

impl Tick {
  /// The first tick after start-up only looks at the current minute.
  pub fn first(now: NaiveDateTime) -> Self {
    Self { now, window: TickWindow::current_minute(now) }
  }

  /// The tick following `self`.
  pub fn next(&self, now: NaiveDateTime, max_catch_up: Duration) -> Self {
    Self {
      now,
      window: TickWindow::following(self.window.until, now, max_catch_up),
    }
  }
}

// ─── Matching ────────────────────────────────────────────────────────────────

/// Policy deciding whether a schedule entry is due on a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScheduleMatcher {
  /// Minute-of-day comparison against the tick window.
  #[default]
  Window,
  /// Stored string must equal `now` rendered with `format`, on today's
  /// weekday.
  Exact { format: String },
}

impl ScheduleMatcher {
  pub fn exact() -> Self {
    Self::Exact { format: DEFAULT_EXACT_FORMAT.to_owned() }
  }

  /// Weekdays whose subjects must be loaded for this tick; used as the coarse
  /// store-side filter before [`Self::due_entries`].
  pub fn days_to_query(&self, tick: &Tick) -> Vec<Weekday> {
    match self {
      Self::Window => {
        let mut days: Vec<Weekday> =
          tick.window.dates().into_iter().map(Weekday::of).collect();
        days.dedup();
        days
      }
      Self::Exact { .. } => vec![Weekday::of(tick.now.date())],
    }
  }

  /// The entries of `subject` that are due on `tick`.
  pub fn due_entries<'a>(
    &self,
    subject: &'a Subject,
    tick: &Tick,
  ) -> Vec<&'a ScheduleEntry> {
    match self {
      Self::Window => {
        let dates = tick.window.dates();
        subject
          .schedule
          .iter()
          .filter(|entry| window_hit(entry, &dates, &tick.window))
          .collect()
      }
      Self::Exact { format } => {
        let today = Weekday::of(tick.now.date());
        let now_str = tick.now.format(format).to_string();
        subject
          .schedule
          .iter()
          .filter(|entry| entry.day == today && entry.time == now_str)
          .collect()
      }
    }
  }

  pub fn is_due(&self, subject: &Subject, tick: &Tick) -> bool {
    !self.due_entries(subject, tick).is_empty()
  }
}

fn window_hit(
  entry: &ScheduleEntry,
  dates: &[NaiveDate],
  window: &TickWindow,
) -> bool {
  let time = match entry.time_of_day() {
    Ok(t) => t,
    Err(e) => {
      debug!(time = %entry.time, error = %e, "skipping schedule entry");
      return false;
    }
  };
  dates
    .iter()
    .filter(|d| Weekday::of(**d) == entry.day)
    .any(|d| window.contains(d.and_time(time)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subject::Coordinates;
  use uuid::Uuid;

  // 2024-01-01 was a Monday.
  fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
      .unwrap()
      .and_hms_opt(h, m, s)
      .unwrap()
  }

  fn subject(schedule: Vec<ScheduleEntry>) -> Subject {
    Subject {
      subject_id: Uuid::new_v4(),
      name: "Physics".into(),
      location_name: "Hall A".into(),
      coordinates: Coordinates::new(12.97, 77.59),
      schedule,
    }
  }

  #[test]
  fn weekday_names_roundtrip() {
    assert_eq!(Weekday::parse("Wednesday").unwrap(), Weekday::Wednesday);
    assert_eq!(Weekday::Friday.to_string(), "Friday");
    assert!(Weekday::parse("wednesday").is_err());
    assert_eq!(Weekday::of(at(1, 0, 0, 0).date()), Weekday::Monday);
  }

  #[test]
  fn parses_24h_and_meridiem_times() {
    let nine_thirty = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    assert_eq!(parse_time_of_day("09:30").unwrap(), nine_thirty);
    assert_eq!(parse_time_of_day("9:30").unwrap(), nine_thirty);
    assert_eq!(parse_time_of_day("9:30 AM").unwrap(), nine_thirty);
    assert_eq!(parse_time_of_day(" 9:30 am ").unwrap(), nine_thirty);
    assert_eq!(
      parse_time_of_day("12:15 PM").unwrap(),
      NaiveTime::from_hms_opt(12, 15, 0).unwrap()
    );
    assert_eq!(
      parse_time_of_day("21:05:59").unwrap(),
      NaiveTime::from_hms_opt(21, 5, 0).unwrap()
    );
    assert!(matches!(
      parse_time_of_day("half past nine"),
      Err(Error::InvalidTime(_))
    ));
  }

  #[test]
  fn first_tick_covers_current_minute() {
    let tick = Tick::first(at(1, 9, 0, 42));
    assert!(tick.window.contains(at(1, 9, 0, 0)));
    assert!(!tick.window.contains(at(1, 8, 59, 0)));
    assert!(!tick.window.contains(at(1, 9, 1, 0)));
  }

  #[test]
  fn consecutive_ticks_fire_each_minute_once() {
    let s = subject(vec![ScheduleEntry::new(Weekday::Monday, "09:00")]);
    let matcher = ScheduleMatcher::Window;

    // Ticks land 37s into each minute; drift of a few seconds must not
    // change the outcome.
    let mut tick = Tick::first(at(1, 8, 57, 37));
    let mut fired = usize::from(matcher.is_due(&s, &tick));
    for (m, sec) in [(58, 38), (59, 39), (0, 40), (1, 41), (2, 42)] {
      let h = if m >= 57 { 8 } else { 9 };
      tick = tick.next(at(1, h, m, sec), Duration::minutes(5));
      fired += usize::from(matcher.is_due(&s, &tick));
    }
    assert_eq!(fired, 1);
  }

  #[test]
  fn skipped_minute_is_caught_up() {
    let s = subject(vec![ScheduleEntry::new(Weekday::Monday, "9:00 AM")]);
    let first = Tick::first(at(1, 8, 59, 59));
    // The next tick arrives late, at 09:01:02.
    let late = first.next(at(1, 9, 1, 2), Duration::minutes(5));
    assert!(!ScheduleMatcher::Window.is_due(&s, &first));
    assert!(ScheduleMatcher::Window.is_due(&s, &late));
  }

  #[test]
  fn catch_up_is_capped() {
    let prev = Tick::first(at(1, 8, 0, 0));
    let tick = prev.next(at(1, 9, 30, 0), Duration::minutes(5));
    assert_eq!(tick.window.after, at(1, 9, 25, 0));
    let s = subject(vec![ScheduleEntry::new(Weekday::Monday, "09:00")]);
    assert!(!ScheduleMatcher::Window.is_due(&s, &tick));
  }

  #[test]
  fn window_across_midnight_uses_both_days() {
    let prev = Tick::first(at(7, 23, 59, 30)); // Sunday
    let tick = prev.next(at(8, 0, 0, 30), Duration::minutes(5)); // Monday
    assert_eq!(
      ScheduleMatcher::Window.days_to_query(&tick),
      vec![Weekday::Monday]
    );

    let wide = prev.next(at(8, 0, 1, 0), Duration::minutes(5));
    let s = subject(vec![ScheduleEntry::new(Weekday::Monday, "00:00")]);
    assert!(ScheduleMatcher::Window.is_due(&s, &wide));

    let late_sunday = Tick::first(at(7, 23, 58, 10))
      .next(at(8, 0, 0, 5), Duration::minutes(5));
    assert_eq!(
      ScheduleMatcher::Window.days_to_query(&late_sunday),
      vec![Weekday::Sunday, Weekday::Monday]
    );
  }

  #[test]
  fn backwards_clock_yields_empty_window() {
    let prev = Tick::first(at(1, 10, 0, 0));
    let tick = prev.next(at(1, 9, 0, 0), Duration::minutes(5));
    assert!(tick.window.is_empty());
    assert!(tick.window.dates().is_empty());
  }

  #[test]
  fn clock_stepping_back_does_not_refire() {
    let s = subject(vec![ScheduleEntry::new(Weekday::Monday, "09:01")]);
    let matcher = ScheduleMatcher::Window;
    let catch_up = Duration::minutes(5);

    let t1 = Tick::first(at(1, 9, 1, 5));
    let t2 = t1.next(at(1, 9, 0, 50), catch_up);
    let t3 = t2.next(at(1, 9, 1, 50), catch_up);

    assert!(t2.window.is_empty());
    assert_eq!(t2.window.until, at(1, 9, 1, 0));
    let fired = [t1, t2, t3].iter().filter(|t| matcher.is_due(&s, t)).count();
    assert_eq!(fired, 1);

    let t4 = t3.next(at(1, 9, 2, 10), catch_up);
    assert!(t4.window.contains(at(1, 9, 2, 0)));
    assert!(!t4.window.contains(at(1, 9, 1, 0)));
  }

  #[test]
  fn oversized_catch_up_does_not_overflow() {
    let prev = Tick::first(at(1, 9, 0, 0));
    let tick = prev.next(at(1, 9, 3, 0), Duration::MAX);
    assert_eq!(tick.window.after, at(1, 9, 0, 0));
    assert_eq!(tick.window.until, at(1, 9, 3, 0));
  }

  #[test]
  fn wrong_day_never_matches() {
    let s = subject(vec![ScheduleEntry::new(Weekday::Tuesday, "09:00")]);
    let tick = Tick::first(at(1, 9, 0, 0));
    assert!(!ScheduleMatcher::Window.is_due(&s, &tick));
    assert!(!ScheduleMatcher::exact().is_due(&s, &tick));
  }

  #[test]
  fn exact_mode_compares_rendered_strings() {
    let s = subject(vec![
      ScheduleEntry::new(Weekday::Monday, "9:05 AM"),
      ScheduleEntry::new(Weekday::Monday, "09:05"),
    ]);
    let tick = Tick::first(at(1, 9, 5, 12));
    let due = ScheduleMatcher::exact().due_entries(&s, &tick);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].time, "9:05 AM");

    let next_minute = Tick::first(at(1, 9, 6, 0));
    assert!(!ScheduleMatcher::exact().is_due(&s, &next_minute));
  }

  #[test]
  fn unparseable_times_are_skipped_in_window_mode() {
    let s = subject(vec![
      ScheduleEntry::new(Weekday::Monday, "after lunch"),
      ScheduleEntry::new(Weekday::Monday, "09:00"),
    ]);
    let tick = Tick::first(at(1, 9, 0, 0));
    let due = ScheduleMatcher::Window.due_entries(&s, &tick);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].time, "09:00");
  }
}
