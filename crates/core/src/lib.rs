//! Domain types shared by every crate in the notification relay.
//!
//! - [`NotificationRecord`] -- the record moved between the two sequences.
//! - [`channels`] -- well-known bus channel and store sequence names.
//! - [`CoreError`] -- domain-level error taxonomy.
//! - [`retry`] -- bounded exponential backoff for backend connections.

pub mod channels;
pub mod error;
pub mod notification;
pub mod retry;
pub mod types;

pub use error::CoreError;
pub use notification::NotificationRecord;
