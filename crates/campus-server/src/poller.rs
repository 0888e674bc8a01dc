//! Background task that reminds students to check in when a subject is
//! scheduled.
//!
//! Each tick asks the [`Clock`] for the local wall time, loads the subjects
//! scheduled on the day(s) the tick covers, lets the [`ScheduleMatcher`]
//! decide which are due and sends one [`Notification`] per due subject.
//! Ticks run one after another inside a single task, so they never overlap.
//!
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! let poller = SchedulePoller::new(store, notifier, SystemClock);
//! tokio::spawn(poller.run(cancel.child_token()));
//! ```

use std::{sync::Arc, time::Duration};

use campus_core::{
  schedule::{ScheduleMatcher, Tick, TickWindow},
  store::CampusStore,
};
use chrono::{Local, NaiveDateTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notify::{Notification, Notifier};

/// Default time between ticks.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Default lookback after a stall.
pub const DEFAULT_MAX_CATCH_UP_MINUTES: i64 = 5;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;
}

/// The host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
  /// Subjects with at least one entry due.
  pub due:    usize,
  pub sent:   usize,
  pub failed: usize,
}

pub struct SchedulePoller<S, N, C = SystemClock> {
  store:        Arc<S>,
  notifier:     N,
  clock:        C,
  matcher:      ScheduleMatcher,
  period:       Duration,
  max_catch_up: chrono::Duration,
  /// Last tick whose subjects were loaded, or the point to resume from
  /// after a failed first tick. Catch-up starts after its window.
  last:         Option<Tick>,
}

impl<S, N, C> SchedulePoller<S, N, C>
where
  S: CampusStore,
  N: Notifier,
  C: Clock,
{
  pub fn new(store: Arc<S>, notifier: N, clock: C) -> Self {
    Self {
      store,
      notifier,
      clock,
      matcher: ScheduleMatcher::default(),
      period: DEFAULT_PERIOD,
      max_catch_up: chrono::Duration::minutes(DEFAULT_MAX_CATCH_UP_MINUTES),
      last: None,
    }
  }

  pub fn with_matcher(mut self, matcher: ScheduleMatcher) -> Self {
    self.matcher = matcher;
    self
  }

  pub fn with_period(mut self, period: Duration) -> Self {
    self.period = period;
    self
  }

  pub fn with_max_catch_up(mut self, max_catch_up: chrono::Duration) -> Self {
    self.max_catch_up = max_catch_up;
    self
  }

  /// Run a single tick. Store and notifier failures are logged, never
  /// returned.
  pub async fn tick(&mut self) -> TickReport {
    let now = self.clock.now();
    let tick = match &self.last {
      Some(prev) => prev.next(now, self.max_catch_up),
      None => Tick::first(now),
    };

    let days = self.matcher.days_to_query(&tick);
    let subjects = if days.is_empty() {
      Vec::new()
    } else {
      match self.store.subjects_scheduled_on(&days).await {
        Ok(subjects) => subjects,
        Err(e) => {
          error!(error = %e, "failed to load scheduled subjects; skipping tick");
          // The next tick resumes from the start of this one's window.
          if self.last.is_none() {
            let resume = tick.window.after;
            self.last = Some(Tick {
              now,
              window: TickWindow { after: resume, until: resume },
            });
          }
          return TickReport::default();
        }
      }
    };
    self.last = Some(tick);

    let mut report = TickReport::default();
    for subject in subjects.iter().filter(|s| self.matcher.is_due(s, &tick)) {
      report.due += 1;
      let notification = Notification::check_in(subject);
      match self.notifier.notify(&notification).await {
        Ok(()) => {
          report.sent += 1;
          debug!(subject_id = %subject.subject_id, "check-in reminder sent");
        }
        Err(e) => {
          report.failed += 1;
          warn!(
            subject_id = %subject.subject_id,
            error = %e,
            "check-in reminder failed"
          );
        }
      }
    }

    debug!(
      after = %tick.window.after,
      until = %tick.window.until,
      due = report.due,
      sent = report.sent,
      "schedule tick"
    );
    report
  }

  /// Tick every period until `cancel` fires. The first tick runs
  /// immediately.
  pub async fn run(mut self, cancel: CancellationToken) {
    info!(period = ?self.period, matcher = ?self.matcher, "schedule poller started");
    let mut interval = tokio::time::interval(self.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("schedule poller cancelled");
          break;
        }
        _ = interval.tick() => {
          self.tick().await;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use campus_core::{
    attendance::{Attendance, AttendanceView, NewAttendance},
    post::{NewPost, Post},
    schedule::{ScheduleEntry, Weekday},
    store::StoreError,
    subject::{Coordinates, NewSubject, Subject},
    user::{NewUser, ProfileUpdate, User},
  };
  use campus_store_sqlite::SqliteStore;
  use chrono::NaiveDate;
  use uuid::Uuid;

  #[derive(Clone)]
  struct ManualClock(Arc<Mutex<NaiveDateTime>>);

  impl ManualClock {
    fn at(t: NaiveDateTime) -> Self { Self(Arc::new(Mutex::new(t))) }
    fn set(&self, t: NaiveDateTime) { *self.0.lock().unwrap() = t; }
  }

  impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime { *self.0.lock().unwrap() }
  }

  #[derive(Debug, thiserror::Error)]
  #[error("endpoint unreachable")]
  struct Unreachable;

  #[derive(Clone, Default)]
  struct Recorder {
    sent:     Arc<Mutex<Vec<Notification>>>,
    fail_for: Option<Uuid>,
  }

  impl Recorder {
    fn sent(&self) -> Vec<Notification> { self.sent.lock().unwrap().clone() }
  }

  impl Notifier for Recorder {
    type Error = Unreachable;

    async fn notify(&self, notification: &Notification) -> Result<(), Self::Error> {
      if self.fail_for == Some(notification.subject_id) {
        return Err(Unreachable);
      }
      self.sent.lock().unwrap().push(notification.clone());
      Ok(())
    }
  }

  /// 2024-01-01 is a Monday.
  fn monday(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
      .unwrap()
      .and_hms_opt(h, m, s)
      .unwrap()
  }

  async fn store_with(
    subjects: &[(&str, Vec<ScheduleEntry>)],
  ) -> (Arc<SqliteStore>, Vec<Uuid>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut ids = Vec::new();
    for (name, schedule) in subjects {
      let s = store
        .create_subject(NewSubject {
          name:          (*name).to_owned(),
          location_name: "Main Hall".to_owned(),
          coordinates:   Coordinates::new(12.97, 77.59),
          schedule:      schedule.clone(),
        })
        .await
        .unwrap();
      ids.push(s.subject_id);
    }
    (Arc::new(store), ids)
  }

  #[tokio::test]
  async fn several_due_entries_send_one_notification() {
    let (store, ids) = store_with(&[(
      "Chemistry",
      vec![
        ScheduleEntry::new(Weekday::Monday, "09:00"),
        ScheduleEntry::new(Weekday::Monday, "9:00 AM"),
      ],
    )])
    .await;
    let recorder = Recorder::default();
    let mut poller =
      SchedulePoller::new(store, recorder.clone(), ManualClock::at(monday(9, 0, 30)));

    let report = poller.tick().await;
    assert_eq!(report, TickReport { due: 1, sent: 1, failed: 0 });
    assert_eq!(
      recorder.sent(),
      vec![Notification {
        subject_id: ids[0],
        message:    "Time to check in for Chemistry".into(),
      }]
    );
  }

  #[tokio::test]
  async fn nothing_due_sends_nothing() {
    let (store, _) = store_with(&[
      ("Biology", vec![ScheduleEntry::new(Weekday::Monday, "10:00")]),
      ("History", vec![ScheduleEntry::new(Weekday::Tuesday, "09:00")]),
    ])
    .await;
    let recorder = Recorder::default();
    let mut poller =
      SchedulePoller::new(store, recorder.clone(), ManualClock::at(monday(9, 0, 0)));

    assert_eq!(poller.tick().await, TickReport::default());
    assert!(recorder.sent().is_empty());
  }

  #[tokio::test]
  async fn failed_notification_does_not_stop_tick() {
    let (store, ids) = store_with(&[
      ("Art", vec![ScheduleEntry::new(Weekday::Monday, "09:00")]),
      ("Music", vec![ScheduleEntry::new(Weekday::Monday, "09:00")]),
    ])
    .await;
    let recorder = Recorder { fail_for: Some(ids[0]), ..Default::default() };
    let mut poller =
      SchedulePoller::new(store, recorder.clone(), ManualClock::at(monday(9, 0, 5)));

    let report = poller.tick().await;
    assert_eq!(report, TickReport { due: 2, sent: 1, failed: 1 });
    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject_id, ids[1]);
  }

  #[tokio::test]
  async fn consecutive_ticks_fire_once() {
    let (store, _) = store_with(&[(
      "Maths",
      vec![ScheduleEntry::new(Weekday::Monday, "09:00")],
    )])
    .await;
    let recorder = Recorder::default();
    let clock = ManualClock::at(monday(8, 59, 50));
    let mut poller = SchedulePoller::new(store, recorder.clone(), clock.clone());

    let mut total = 0;
    for t in [monday(8, 59, 50), monday(9, 0, 40), monday(9, 1, 30), monday(9, 2, 20)] {
      clock.set(t);
      total += poller.tick().await.sent;
    }
    assert_eq!(total, 1);
    assert_eq!(recorder.sent().len(), 1);
  }

  #[tokio::test]
  async fn stalled_poller_catches_up() {
    let (store, _) = store_with(&[(
      "Maths",
      vec![ScheduleEntry::new(Weekday::Monday, "09:00")],
    )])
    .await;
    let recorder = Recorder::default();
    let clock = ManualClock::at(monday(8, 58, 10));
    let mut poller = SchedulePoller::new(store, recorder.clone(), clock.clone());

    poller.tick().await;
    clock.set(monday(9, 2, 10));
    assert_eq!(poller.tick().await.sent, 1);
  }

  #[derive(Debug, thiserror::Error)]
  #[error("store offline")]
  struct Offline;

  impl StoreError for Offline {
    fn as_core(&self) -> Option<&campus_core::Error> { None }
  }

  /// Serves subjects from memory and fails the first `failures` loads.
  struct FlakyStore {
    subjects: Vec<Subject>,
    failures: AtomicUsize,
  }

  impl CampusStore for FlakyStore {
    type Error = Offline;

    async fn subjects_scheduled_on(
      &self,
      days: &[Weekday],
    ) -> Result<Vec<Subject>, Offline> {
      if self
        .failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
      {
        return Err(Offline);
      }
      Ok(
        self
          .subjects
          .iter()
          .filter(|s| s.schedule.iter().any(|e| days.contains(&e.day)))
          .cloned()
          .collect(),
      )
    }

    async fn create_subject(&self, _: NewSubject) -> Result<Subject, Offline> {
      unimplemented!()
    }
    async fn get_subject(&self, _: Uuid) -> Result<Option<Subject>, Offline> {
      unimplemented!()
    }
    async fn list_subjects(&self) -> Result<Vec<Subject>, Offline> {
      unimplemented!()
    }
    async fn update_subject(
      &self,
      _: Uuid,
      _: NewSubject,
    ) -> Result<Option<Subject>, Offline> {
      unimplemented!()
    }
    async fn record_attendance(
      &self,
      _: NewAttendance,
    ) -> Result<Attendance, Offline> {
      unimplemented!()
    }
    async fn list_attendance(
      &self,
      _: Option<Uuid>,
    ) -> Result<Vec<AttendanceView>, Offline> {
      unimplemented!()
    }
    async fn create_user(&self, _: NewUser) -> Result<User, Offline> {
      unimplemented!()
    }
    async fn get_user(&self, _: Uuid) -> Result<Option<User>, Offline> {
      unimplemented!()
    }
    async fn find_user_by_username(
      &self,
      _: &str,
    ) -> Result<Option<User>, Offline> {
      unimplemented!()
    }
    async fn update_profile(
      &self,
      _: Uuid,
      _: ProfileUpdate,
    ) -> Result<Option<User>, Offline> {
      unimplemented!()
    }
    async fn leaderboard(&self, _: usize) -> Result<Vec<User>, Offline> {
      unimplemented!()
    }
    async fn create_post(&self, _: NewPost) -> Result<Post, Offline> {
      unimplemented!()
    }
    async fn recent_posts(&self, _: usize) -> Result<Vec<Post>, Offline> {
      unimplemented!()
    }
  }

  #[tokio::test]
  async fn failed_first_tick_is_caught_up() {
    let store = FlakyStore {
      subjects: vec![Subject {
        subject_id:    Uuid::new_v4(),
        name:          "Geology".into(),
        location_name: "Field Lab".into(),
        coordinates:   Coordinates::new(0.0, 0.0),
        schedule:      vec![ScheduleEntry::new(Weekday::Monday, "09:00")],
      }],
      failures: AtomicUsize::new(1),
    };
    let recorder = Recorder::default();
    let clock = ManualClock::at(monday(9, 0, 30));
    let mut poller =
      SchedulePoller::new(Arc::new(store), recorder.clone(), clock.clone());

    assert_eq!(poller.tick().await, TickReport::default());
    assert!(recorder.sent().is_empty());

    clock.set(monday(9, 1, 20));
    assert_eq!(poller.tick().await, TickReport { due: 1, sent: 1, failed: 0 });

    clock.set(monday(9, 2, 10));
    assert_eq!(poller.tick().await.sent, 0);
  }

  #[tokio::test]
  async fn exact_mode_compares_rendered_time() {
    let (store, ids) = store_with(&[
      ("Legacy", vec![ScheduleEntry::new(Weekday::Monday, "9:00 AM")]),
      ("Padded", vec![ScheduleEntry::new(Weekday::Monday, "09:00")]),
    ])
    .await;
    let recorder = Recorder::default();
    let mut poller =
      SchedulePoller::new(store, recorder.clone(), ManualClock::at(monday(9, 0, 15)))
        .with_matcher(ScheduleMatcher::exact());

    assert_eq!(poller.tick().await.sent, 1);
    assert_eq!(recorder.sent()[0].subject_id, ids[0]);
  }

  #[tokio::test]
  async fn run_stops_on_cancel() {
    let (store, _) = store_with(&[]).await;
    let poller =
      SchedulePoller::new(store, Recorder::default(), ManualClock::at(monday(9, 0, 0)))
        .with_period(Duration::from_millis(10));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(poller.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(35)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
      .await
      .expect("poller did not stop")
      .unwrap();
  }
}
