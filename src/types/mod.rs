//! Data types shared across the monitor

pub mod display;
pub mod heartrate;
pub mod profile;

pub use heartrate::{classify, HeartRateEntry, HeartRateLog, SessionView, TimestampOrdering};
pub use profile::UserProfile;
