//! monitor/mod.rs
//!
//! The live heart-rate session: a projection of the latest reading for the
//! monitor screen and the ordered history with deletion for the history
//! screen.
//!
//! # Concepts
//!
//! - **Log**: `{history_root}/{user}/{timestamp}` entries written by the
//!   device. The backend owns it; nothing here is authoritative.
//! - **Marker**: the global `date` and `time` values the device writes on
//!   every send. Not tied to a user or an entry.
//! - **Subscription**: a lazy, non-restartable sequence of projections that
//!   ends on the first backend error or when disposed.

mod combine;
mod error;
mod subscription;

pub use error::MonitorError;
pub use subscription::{Subscription, SubscriptionState};

use std::sync::Arc;

use crate::backend::RealtimeBackend;
use crate::config::MonitorConfig;
use crate::types::heartrate::{self, HeartRateEntry, SessionView};
use combine::{HistoryProjector, LatestCache, MarkerHalf};
use subscription::Feed;

/// Projects the latest reading and manages the history of each user.
pub struct HeartRateSessionManager {
    backend: Arc<dyn RealtimeBackend>,
    config: MonitorConfig,
}

impl HeartRateSessionManager {
    /// Create a manager with the default backend layout
    pub fn new(backend: Arc<dyn RealtimeBackend>) -> Self {
        Self::with_config(backend, MonitorConfig::default())
    }

    pub fn with_config(backend: Arc<dyn RealtimeBackend>, config: MonitorConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// True iff `60 <= bpm <= 100`
    pub fn classify(bpm: u32) -> bool {
        heartrate::classify(bpm)
    }

    /// Live view of the user's latest reading and the global last-send time.
    ///
    /// The log and both marker halves are watched independently; any of
    /// them changing produces a new view built from the latest value of all
    /// three. The first view for an empty log is `SessionView::default()`.
    pub fn subscribe_latest(&self, user_id: &str) -> Result<Subscription<SessionView>, MonitorError> {
        let history = self.config.history_path(user_id)?;
        let date = self.config.date_marker_path()?;
        let time = self.config.time_marker_path()?;

        log::info!("Subscribing to latest heart rate at {}", history);
        let (feed, subscription) = Feed::open(
            format!("latest:{}", history),
            self.backend.clone(),
            LatestCache::new(self.config.timestamp_ordering),
        );
        feed.listen(&history, |cache: &mut LatestCache, snapshot| cache.on_log(&snapshot));
        feed.listen(&date, |cache: &mut LatestCache, snapshot| {
            cache.on_marker(MarkerHalf::Date, &snapshot)
        });
        feed.listen(&time, |cache: &mut LatestCache, snapshot| {
            cache.on_marker(MarkerHalf::Time, &snapshot)
        });
        Ok(subscription)
    }

    /// Live history of the user, newest first. Every change re-emits the
    /// full list.
    pub fn list_history(
        &self,
        user_id: &str,
    ) -> Result<Subscription<Vec<HeartRateEntry>>, MonitorError> {
        let history = self.config.history_path(user_id)?;

        log::info!("Subscribing to heart rate history at {}", history);
        let (feed, subscription) = Feed::open(
            format!("history:{}", history),
            self.backend.clone(),
            HistoryProjector::new(self.config.timestamp_ordering),
        );
        feed.listen(&history, |projector: &mut HistoryProjector, snapshot| {
            projector.on_log(&snapshot)
        });
        Ok(subscription)
    }

    /// Remove one entry. Removing an entry that does not exist succeeds.
    pub async fn delete_entry(&self, user_id: &str, timestamp: &str) -> Result<(), MonitorError> {
        let path = self.config.history_entry_path(user_id, timestamp)?;
        match self.backend.delete(&path).await {
            Ok(()) => {
                log::info!("Deleted heart rate entry {}", path);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to delete heart rate entry {}: {}", path, e);
                Err(e.into())
            }
        }
    }

    /// Remove the user's whole history
    pub async fn delete_all_history(&self, user_id: &str) -> Result<(), MonitorError> {
        let path = self.config.history_path(user_id)?;
        match self.backend.delete(&path).await {
            Ok(()) => {
                log::info!("Deleted all heart rate history at {}", path);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to delete heart rate history {}: {}", path, e);
                Err(e.into())
            }
        }
    }
}
