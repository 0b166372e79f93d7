//! Notification lifecycle.
//!
//! The [`NotificationLifecycle`] owns the rule that every record lives in
//! exactly one of the unverified / verified sequences, and publishes each
//! transition on the event bus.

pub mod lifecycle;

pub use lifecycle::{LifecycleError, NotificationLifecycle};
