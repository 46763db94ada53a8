//! Zone registry.
//!
//! The registry owns the active zone polygons. Evaluation always runs against
//! one immutable [`ZoneSet`] snapshot, and [`spawn_reload_task`] refreshes it
//! from a [`ZoneSource`] on a timer.

mod file;
mod registry;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use file::JsonZoneFile;
pub use registry::{StaticZoneSource, ZoneRegistry, ZoneSet, ZoneSource};

/// Reload the registry every `interval` until cancelled.
///
/// Source reads run on the blocking pool. A failed reload is logged and the
/// previous zone set stays in effect.
pub fn spawn_reload_task(
    registry: Arc<ZoneRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; the caller has already loaded once.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let registry = Arc::clone(&registry);
            match tokio::task::spawn_blocking(move || registry.reload()).await {
                Ok(Ok(count)) => tracing::debug!(zones = count, "Periodic zone reload"),
                Ok(Err(e)) => tracing::warn!("Zone reload failed, keeping previous zones: {}", e),
                Err(e) => tracing::error!("Zone reload task panicked: {}", e),
            }
        }

        tracing::debug!("Zone reload task stopped");
    })
}
