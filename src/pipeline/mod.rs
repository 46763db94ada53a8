//! Per-sample ingestion.
//!
//! [`IngestionPipeline::process`] applies one sample to every store in a fixed
//! order. The steps are independent failure domains: a failed durable write is
//! logged and the remaining steps still run. Only a malformed sample stops
//! processing, and it is rejected before anything is touched.
//!
//! Callers must serialize samples for the same object; [`Dispatcher`] does
//! this by sharding on object id.

mod dispatcher;
mod sweeper;

use std::sync::Arc;

use crate::cache::ActiveObjectCache;
use crate::error::TrackingError;
use crate::events::EventEmitter;
use crate::membership::MembershipTracker;
use crate::models::{ObjectEvent, ObjectStatus, PositionPoint, PositionSample, ZoneEvent};
use crate::store::{DocumentStore, PositionSeries};
use crate::zones::ZoneRegistry;

pub use dispatcher::{DispatchHandle, Dispatcher};
pub use sweeper::DisappearanceSweeper;

/// What one call to [`IngestionPipeline::process`] managed to do.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessReport {
    pub position_written: bool,
    pub object_upserted: bool,
    pub appearance: Option<ObjectEvent>,
    pub zone_events: Vec<ZoneEvent>,
}

pub struct IngestionPipeline {
    registry: Arc<ZoneRegistry>,
    tracker: Arc<MembershipTracker>,
    emitter: EventEmitter,
    cache: Arc<ActiveObjectCache>,
    series: Arc<dyn PositionSeries>,
    documents: Arc<dyn DocumentStore>,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<ZoneRegistry>,
        tracker: Arc<MembershipTracker>,
        cache: Arc<ActiveObjectCache>,
        series: Arc<dyn PositionSeries>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            registry,
            tracker,
            emitter: EventEmitter::new(Arc::clone(&documents)),
            cache,
            series,
            documents,
        }
    }

    pub fn process(&self, sample: &PositionSample) -> Result<ProcessReport, TrackingError> {
        if let Some(reason) = sample.validation_error() {
            tracing::warn!(object_id = %sample.object_id, "Dropping sample: {}", reason);
            return Err(TrackingError::MalformedInput(reason.to_string()));
        }

        let mut report = ProcessReport::default();

        // 1. Raw time series
        match self.series.write_position(&PositionPoint::from(sample)) {
            Ok(()) => report.position_written = true,
            Err(e) => tracing::warn!(
                object_id = %sample.object_id,
                "{}",
                TrackingError::durable("object_positions", e)
            ),
        }

        // 2 + 3. Object record and appearance
        match self.documents.upsert_object(sample) {
            Ok(prior) => {
                report.object_upserted = true;
                if let Some(prior) = prior.filter(|p| p.status == ObjectStatus::Gone) {
                    report.appearance = self.record_appearance(sample, prior.last_disappearance);
                }
            }
            Err(e) => tracing::warn!(
                object_id = %sample.object_id,
                "{}",
                TrackingError::durable("objects", e)
            ),
        }

        // 4. Membership and zone events
        let zones = self.registry.snapshot();
        let delta = self
            .tracker
            .observe(&sample.object_id, sample.point(), &zones);
        if !delta.is_empty() {
            report.zone_events = self.emitter.emit(sample, &delta);
        }

        // 5. Live view
        self.cache.update(&sample.object_id, sample.x, sample.y);

        tracing::debug!(
            object_id = %sample.object_id,
            x = sample.x,
            y = sample.y,
            zone_events = report.zone_events.len(),
            "Processed sample"
        );

        Ok(report)
    }

    fn record_appearance(
        &self,
        sample: &PositionSample,
        previous_disappearance: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Option<ObjectEvent> {
        match self.documents.mark_active(&sample.object_id) {
            Ok(true) => {}
            // Someone else already flipped it back.
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(
                    object_id = %sample.object_id,
                    "{}",
                    TrackingError::durable("objects", e)
                );
                return None;
            }
        }

        let event =
            ObjectEvent::appearance(&sample.object_id, sample.timestamp, previous_disappearance);
        if let Err(e) = self.documents.insert_object_event(&event) {
            tracing::warn!(
                object_id = %sample.object_id,
                "{}",
                TrackingError::durable("object_events", e)
            );
            return None;
        }

        tracing::info!(
            object_id = %sample.object_id,
            previous_disappearance = ?previous_disappearance,
            "Object reappeared"
        );
        Some(event)
    }
}
