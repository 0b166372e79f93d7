//! Well-known bus channel and store sequence names.
//!
//! These are shared with any other client of the same Redis instance, so
//! they must stay byte-for-byte stable.

/// Bus channel carrying newly created (unverified) records.
pub const CHANNEL_NEW: &str = "notifications:new";

/// Bus channel carrying records that have just been verified.
pub const CHANNEL_VERIFIED: &str = "notifications:verified";

/// Every channel a streaming client is subscribed to.
pub const ALL_CHANNELS: [&str; 2] = [CHANNEL_NEW, CHANNEL_VERIFIED];

/// Store sequence holding unverified records, newest at the head.
pub const SEQ_UNVERIFIED: &str = "notifications:unverified";

/// Store sequence holding verified records, oldest verification at the head.
pub const SEQ_VERIFIED: &str = "notifications:verified";
