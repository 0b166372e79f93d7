/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Notification ids are opaque strings on the wire and in storage.
pub type NotificationId = String;
