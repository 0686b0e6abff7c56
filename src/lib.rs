// Heartline - Live Heart Rate Monitoring

pub mod backend;
pub mod config;
pub mod identity;
pub mod monitor;
pub mod types;

pub use backend::{DbPath, InMemoryBackend, RealtimeBackend, Snapshot};
pub use config::MonitorConfig;
pub use identity::{AuthSession, AuthState, Credentials, IdentityProvider, Screen};
pub use monitor::{HeartRateSessionManager, MonitorError, Subscription, SubscriptionState};
pub use types::{classify, HeartRateEntry, HeartRateLog, SessionView, TimestampOrdering};
