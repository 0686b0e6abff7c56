//! types/heartrate.rs
//!
//! Heart-rate entries as the device writes them, the per-user log they form,
//! and the `SessionView` projected from that log for display.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::backend::Snapshot;

/// Lowest resting heart rate considered normal
pub const NORMAL_BPM_MIN: u32 = 60;

/// Highest resting heart rate considered normal
pub const NORMAL_BPM_MAX: u32 = 100;

/// True iff `bpm` lies in the normal resting range, bounds included.
pub fn classify(bpm: u32) -> bool {
    (NORMAL_BPM_MIN..=NORMAL_BPM_MAX).contains(&bpm)
}

/// How entry timestamps are compared when picking the latest entry and
/// ordering history.
///
/// `Lexicographic` only matches chronological order when every timestamp
/// has the same zero-padded width. `Numeric` compares keys that parse as
/// unsigned integers by value, so "10" sorts after "9".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampOrdering {
    #[default]
    Lexicographic,
    Numeric,
}

impl TimestampOrdering {
    /// Total order over timestamp keys (ascending)
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            TimestampOrdering::Lexicographic => a.cmp(b),
            TimestampOrdering::Numeric => match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                // Numeric keys sort before anything else
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            },
        }
    }
}

/// One timestamped reading in a user's history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateEntry {
    /// Key assigned by the writer, unique within the user's log
    pub timestamp: String,

    /// Beats per minute
    pub bpm: u32,

    /// Display date written alongside the reading
    pub date: String,

    /// Display time written alongside the reading
    pub time: String,
}

impl HeartRateEntry {
    pub fn new(timestamp: impl Into<String>, bpm: u32, date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            bpm,
            date: date.into(),
            time: time.into(),
        }
    }

    /// Decode one child of a history snapshot.
    ///
    /// Missing or non-integer `bpm` reads as 0, missing `date`/`time` as "".
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        let timestamp = snapshot.key()?.to_string();

        let bpm_node = snapshot.child("bpm");
        let bpm = match bpm_node.value() {
            Some(value) => match decode_bpm(value) {
                Some(bpm) => bpm,
                None => {
                    log::warn!("Entry {} has an unusable bpm {}, reading as 0", timestamp, value);
                    0
                }
            },
            None => 0,
        };

        Some(Self {
            bpm,
            date: string_child(snapshot, "date"),
            time: string_child(snapshot, "time"),
            timestamp,
        })
    }

    pub fn is_normal(&self) -> bool {
        classify(self.bpm)
    }
}

/// Whole numbers as they are; in-range fractions are truncated.
fn decode_bpm(value: &serde_json::Value) -> Option<u32> {
    if let Some(bpm) = value.as_u64() {
        return u32::try_from(bpm).ok();
    }
    let bpm = value.as_f64()?;
    (bpm.is_finite() && (0.0..=u32::MAX as f64).contains(&bpm)).then(|| bpm.trunc() as u32)
}

fn string_child(snapshot: &Snapshot, key: &str) -> String {
    snapshot
        .child(key)
        .value()
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// The per-user history as last seen in the backend
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeartRateLog {
    entries: Vec<HeartRateEntry>,
}

impl HeartRateLog {
    pub fn new(entries: Vec<HeartRateEntry>) -> Self {
        Self { entries }
    }

    /// Decode the snapshot of `{history_root}/{user}`
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let entries = snapshot
            .children()
            .iter()
            .filter_map(HeartRateEntry::from_snapshot)
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, timestamp: &str) -> Option<&HeartRateEntry> {
        self.entries.iter().find(|e| e.timestamp == timestamp)
    }

    /// Entry with the greatest timestamp under `ordering`
    pub fn latest(&self, ordering: TimestampOrdering) -> Option<&HeartRateEntry> {
        self.entries
            .iter()
            .max_by(|a, b| ordering.compare(&a.timestamp, &b.timestamp))
    }

    /// All entries, newest first
    pub fn sorted_descending(&self, ordering: TimestampOrdering) -> Vec<HeartRateEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| ordering.compare(&b.timestamp, &a.timestamp));
        sorted
    }
}

/// What the monitor screen shows: the latest reading, its classification,
/// and when the device last reported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub current_bpm: u32,
    pub is_normal: bool,
    pub last_send_time: String,
}

impl SessionView {
    /// Project a view from the cached inputs. A missing log counts as empty.
    pub fn project(
        log: Option<&HeartRateLog>,
        date: &str,
        time: &str,
        ordering: TimestampOrdering,
    ) -> Self {
        let last_send_time = join_marker(date, time);
        match log.and_then(|l| l.latest(ordering)) {
            Some(latest) => Self {
                current_bpm: latest.bpm,
                is_normal: classify(latest.bpm),
                last_send_time,
            },
            None => Self {
                last_send_time,
                ..Self::default()
            },
        }
    }
}

/// Non-empty halves of the global marker, space separated
pub fn join_marker(date: &str, time: &str) -> String {
    [date.trim(), time.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
