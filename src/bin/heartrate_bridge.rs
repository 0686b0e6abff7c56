// src/bin/heartrate_bridge.rs
//! Heartline demo bridge: a simulated wearable pushes readings into an
//! in-memory backend while a signed-in user watches the live view and the
//! history, then clears it.
//!
//! Usage: heartrate_bridge [config.json]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use serde_json::json;
use tokio::time::sleep;

use heartline::backend::{DbPath, InMemoryBackend, RealtimeBackend};
use heartline::identity::{AuthSession, Credentials, InMemoryIdentityProvider, Registration};
use heartline::types::display::format_millis;
use heartline::{HeartRateSessionManager, MonitorConfig};

const READINGS: [u32; 6] = [72, 88, 104, 65, 58, 97];

/// Writes readings the way the wearable does: one entry per send plus the
/// global date/time marker.
struct SimulatedDevice {
    backend: Arc<InMemoryBackend>,
    history: DbPath,
    date: DbPath,
    time: DbPath,
    offset: FixedOffset,
}

impl SimulatedDevice {
    async fn send(&self, bpm: u32) -> Result<()> {
        let now = Utc::now();
        let local = now.with_timezone(&self.offset);
        // Fixed width keeps lexicographic order chronological
        let timestamp = format!("{:013}", now.timestamp_millis());
        let date = local.format("%d/%m/%Y").to_string();
        let time = local.format("%H:%M:%S").to_string();

        self.backend
            .write(
                &self.history.child(&timestamp)?,
                json!({"bpm": bpm, "date": date, "time": time}),
            )
            .await?;
        self.backend.write(&self.date, json!(date)).await?;
        self.backend.write(&self.time, json!(time)).await?;

        log::debug!(
            "Device sent {} bpm at {}",
            bpm,
            format_millis(now.timestamp_millis(), self.offset.local_minus_utc() / 60)
                .unwrap_or_default()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => MonitorConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => MonitorConfig::default(),
    };

    let backend = Arc::new(InMemoryBackend::new());
    let session = AuthSession::new(
        Arc::new(InMemoryIdentityProvider::new()),
        backend.clone(),
        config.clone(),
    );
    let user_id = session
        .register(&Registration {
            credentials: Credentials::new("demo@heartline.local", "demo-password"),
            name: "Demo".to_string(),
            age: "30".to_string(),
        })
        .await?;

    let manager = HeartRateSessionManager::with_config(backend.clone(), config.clone());
    let mut latest = manager.subscribe_latest(&user_id)?;
    let mut history = manager.list_history(&user_id)?;

    let printer = tokio::spawn(async move {
        while let Some(item) = latest.next().await {
            match item {
                Ok(view) => println!(
                    "{:>8}  {:<8}  {}",
                    view.bpm_label(),
                    view.status_label(),
                    view.last_send_label()
                ),
                Err(e) => {
                    eprintln!("Live view stopped: {}", e.user_message());
                    break;
                }
            }
        }
    });

    let offset = FixedOffset::east_opt(config.display_utc_offset_minutes * 60)
        .context("display offset out of range")?;
    let device = SimulatedDevice {
        backend: backend.clone(),
        history: config.history_path(&user_id)?,
        date: config.date_marker_path()?,
        time: config.time_marker_path()?,
        offset,
    };
    for bpm in READINGS {
        device.send(bpm).await?;
        sleep(Duration::from_millis(200)).await;
    }

    let mut entries = Vec::new();
    while let Some(item) = history.next_ready() {
        entries = item?;
    }
    println!("History ({} entries):", entries.len());
    for entry in &entries {
        println!("  {}", entry.summary());
    }

    if let Some(newest) = entries.first() {
        manager.delete_entry(&user_id, &newest.timestamp).await?;
    }
    manager.delete_all_history(&user_id).await?;
    sleep(Duration::from_millis(50)).await;

    history.dispose();
    printer.abort();
    session.sign_out().await;
    Ok(())
}
