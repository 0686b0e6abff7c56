//! Text shown by the presentation layer

use chrono::{FixedOffset, TimeZone, Utc};

use super::heartrate::{HeartRateEntry, SessionView};

/// `"75 bpm"`
pub fn format_bpm(bpm: u32) -> String {
    format!("{} bpm", bpm)
}

pub fn status_label(is_normal: bool) -> &'static str {
    if is_normal {
        "Normal"
    } else {
        "Abnormal"
    }
}

/// Render epoch milliseconds as `dd/MM/yyyy HH:mm:ss` at a fixed offset.
///
/// Returns `None` when the offset or the instant is out of range.
pub fn format_millis(millis: i64, utc_offset_minutes: i32) -> Option<String> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    let instant = Utc.timestamp_millis_opt(millis).single()?;
    Some(
        instant
            .with_timezone(&offset)
            .format("%d/%m/%Y %H:%M:%S")
            .to_string(),
    )
}

impl HeartRateEntry {
    /// One history row
    pub fn summary(&self) -> String {
        format!(
            "BPM: {}, Date: {}, Time: {}, Timestamp: {}",
            self.bpm, self.date, self.time, self.timestamp
        )
    }
}

impl SessionView {
    pub fn bpm_label(&self) -> String {
        format_bpm(self.current_bpm)
    }

    pub fn status_label(&self) -> &'static str {
        status_label(self.is_normal)
    }

    pub fn last_send_label(&self) -> String {
        format!("Last sent: {}", self.last_send_time)
    }
}
