//! Domain model for the campus backend: subjects and their weekly
//! schedules, geofenced attendance, riders and community posts.
//!
//! No HTTP or SQL lives here. Storage is reached through
//! [`store::CampusStore`], implemented by the backend crates.

// Store futures carry explicit `Send` bounds in the trait signatures.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod error;
pub mod geofence;
pub mod post;
pub mod schedule;
pub mod store;
pub mod subject;
pub mod user;

pub use error::{Error, Result};
