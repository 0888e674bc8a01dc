//! Delivery of check-in reminders.

use std::{future::Future, time::Duration};

use campus_core::subject::Subject;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload sent for a subject that is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub subject_id: Uuid,
  pub message:    String,
}

impl Notification {
  pub fn check_in(subject: &Subject) -> Self {
    Self {
      subject_id: subject.subject_id,
      message:    format!("Time to check in for {}", subject.name),
    }
  }
}

/// Somewhere a [`Notification`] can be sent.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    notification: &'a Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// POSTs each notification as JSON to a fixed URL.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
  client: Client,
  url:    String,
}

impl HttpNotifier {
  pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }

  pub fn url(&self) -> &str { &self.url }
}

impl Notifier for HttpNotifier {
  type Error = reqwest::Error;

  async fn notify(&self, notification: &Notification) -> Result<(), Self::Error> {
    self
      .client
      .post(&self.url)
      .json(notification)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}
