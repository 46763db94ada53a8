use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::TrackingError;
use crate::models::ObjectEvent;
use crate::store::DocumentStore;

/// Marks objects `gone` once they stop reporting.
///
/// An active object whose `last_updated` is older than `gone_after` is flipped
/// to `gone` with the sweep time as its disappearance, and a disappearance
/// event is recorded. The next sample for it produces an appearance.
pub struct DisappearanceSweeper {
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    gone_after: Duration,
}

impl DisappearanceSweeper {
    pub fn new(documents: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, gone_after: Duration) -> Self {
        Self {
            documents,
            clock,
            gone_after,
        }
    }

    /// Run one pass. Returns the disappearance events that were recorded.
    pub fn sweep(&self) -> Vec<ObjectEvent> {
        let now = self.clock.now();
        let cutoff = match chrono::Duration::from_std(self.gone_after) {
            Ok(window) => now - window,
            Err(_) => return Vec::new(),
        };

        let stale = match self.documents.stale_active_objects(cutoff) {
            Ok(stale) => stale,
            Err(e) => {
                tracing::warn!("Disappearance sweep skipped: {}", e);
                return Vec::new();
            }
        };

        let mut recorded = Vec::new();
        for object in stale {
            // The conditional update loses to a sample that arrived after the query.
            match self.documents.mark_gone(&object.object_id, cutoff, now) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        object_id = %object.object_id,
                        "{}",
                        TrackingError::durable("objects", e)
                    );
                    continue;
                }
            }

            let event = ObjectEvent::disappearance(&object.object_id, now);
            match self.documents.insert_object_event(&event) {
                Ok(()) => {
                    tracing::info!(
                        object_id = %object.object_id,
                        last_updated = %object.last_updated,
                        "Object disappeared"
                    );
                    recorded.push(event);
                }
                Err(e) => tracing::warn!(
                    object_id = %object.object_id,
                    "{}",
                    TrackingError::durable("object_events", e)
                ),
            }
        }

        recorded
    }

    /// Sweep every `interval` on the blocking pool until cancelled.
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let sweeper = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                    Ok(events) if !events.is_empty() => {
                        tracing::debug!(count = events.len(), "Disappearance sweep finished")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!("Disappearance sweep panicked: {}", e),
                }
            }

            tracing::debug!("Disappearance sweeper stopped");
        })
    }
}
