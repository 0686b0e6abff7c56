//! Latest-value cache combining the independent inputs of the live view
//!
//! The log and the two halves of the global marker arrive through separate
//! listeners in no particular order. Each arrival replaces its own cached
//! value and re-projects the view from whatever the others last held, so the
//! result only depends on the latest value of each input.

use crate::backend::Snapshot;
use crate::types::heartrate::{HeartRateEntry, HeartRateLog, SessionView, TimestampOrdering};

/// Which half of the global last-send marker a snapshot carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MarkerHalf {
    Date,
    Time,
}

pub(crate) struct LatestCache {
    ordering: TimestampOrdering,
    log: Option<HeartRateLog>,
    date: String,
    time: String,
}

impl LatestCache {
    pub(crate) fn new(ordering: TimestampOrdering) -> Self {
        Self {
            ordering,
            log: None,
            date: String::new(),
            time: String::new(),
        }
    }

    pub(crate) fn on_log(&mut self, snapshot: &Snapshot) -> SessionView {
        self.log = Some(HeartRateLog::from_snapshot(snapshot));
        self.view()
    }

    pub(crate) fn on_marker(&mut self, half: MarkerHalf, snapshot: &Snapshot) -> SessionView {
        let value = marker_value(snapshot);
        match half {
            MarkerHalf::Date => self.date = value,
            MarkerHalf::Time => self.time = value,
        }
        self.view()
    }

    pub(crate) fn view(&self) -> SessionView {
        SessionView::project(self.log.as_ref(), &self.date, &self.time, self.ordering)
    }
}

fn marker_value(snapshot: &Snapshot) -> String {
    match snapshot.value() {
        Some(value) => match value.as_str() {
            Some(s) => s.to_string(),
            None => {
                log::warn!("Marker {} is not a string: {}", snapshot.path(), value);
                String::new()
            }
        },
        None => String::new(),
    }
}

/// Projection for the history screen: the whole log, newest first
pub(crate) struct HistoryProjector {
    ordering: TimestampOrdering,
}

impl HistoryProjector {
    pub(crate) fn new(ordering: TimestampOrdering) -> Self {
        Self { ordering }
    }

    pub(crate) fn on_log(&self, snapshot: &Snapshot) -> Vec<HeartRateEntry> {
        HeartRateLog::from_snapshot(snapshot).sorted_descending(self.ordering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DbPath;
    use serde_json::json;

    fn log_snapshot(value: serde_json::Value) -> Snapshot {
        Snapshot::new(DbPath::parse("heart_rate_history/u1").unwrap(), Some(value))
    }

    fn marker(path: &str, value: &str) -> Snapshot {
        Snapshot::new(DbPath::parse(path).unwrap(), Some(json!(value)))
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let log = log_snapshot(json!({"001": {"bpm": 75}, "002": {"bpm": 82}}));
        let date = marker("date", "02/01/2024");
        let time = marker("time", "10:00:00");

        let mut log_first = LatestCache::new(TimestampOrdering::Lexicographic);
        log_first.on_log(&log);
        log_first.on_marker(MarkerHalf::Date, &date);
        let a = log_first.on_marker(MarkerHalf::Time, &time);

        let mut marker_first = LatestCache::new(TimestampOrdering::Lexicographic);
        marker_first.on_marker(MarkerHalf::Time, &time);
        marker_first.on_marker(MarkerHalf::Date, &date);
        let b = marker_first.on_log(&log);

        assert_eq!(a, b);
        assert_eq!(a.current_bpm, 82);
        assert!(a.is_normal);
        assert_eq!(a.last_send_time, "02/01/2024 10:00:00");
    }

    #[test]
    fn test_repeated_arrivals_keep_latest() {
        let mut cache = LatestCache::new(TimestampOrdering::Lexicographic);
        cache.on_marker(MarkerHalf::Time, &marker("time", "09:00"));
        cache.on_marker(MarkerHalf::Time, &marker("time", "09:05"));
        let view = cache.on_marker(MarkerHalf::Time, &marker("time", "09:10"));
        assert_eq!(view.last_send_time, "09:10");
        assert_eq!(view.current_bpm, 0);
        assert!(!view.is_normal);
    }

    #[test]
    fn test_marker_removed_or_malformed() {
        let mut cache = LatestCache::new(TimestampOrdering::Lexicographic);
        cache.on_marker(MarkerHalf::Date, &marker("date", "01/01"));
        let removed = cache.on_marker(
            MarkerHalf::Date,
            &Snapshot::new(DbPath::parse("date").unwrap(), None),
        );
        assert_eq!(removed.last_send_time, "");

        let malformed = cache.on_marker(
            MarkerHalf::Date,
            &Snapshot::new(DbPath::parse("date").unwrap(), Some(json!(20240101))),
        );
        assert_eq!(malformed.last_send_time, "");
    }

    #[test]
    fn test_history_projector_orders_descending() {
        let projector = HistoryProjector::new(TimestampOrdering::Lexicographic);
        let entries = projector.on_log(&log_snapshot(json!({
            "001": {"bpm": 75, "date": "01/01", "time": "09:00"},
            "002": {"bpm": 110, "date": "02/01", "time": "10:00"}
        })));
        assert_eq!(
            entries,
            vec![
                HeartRateEntry::new("002", 110, "02/01", "10:00"),
                HeartRateEntry::new("001", 75, "01/01", "09:00"),
            ]
        );
    }
}
