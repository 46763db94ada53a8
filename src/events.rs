//! Zone event emission and dwell matching.
//!
//! Every enter is appended with no duration. Every exit is appended, then the
//! most recently recorded unmatched enter for the same object and zone gets its
//! duration set to the time between the two. An exit with no open enter (for
//! example after a restart) is kept without a duration.
//!
//! Matching follows arrival order, not timestamps. If a producer's clock runs
//! backwards the exit still closes the open stay and the duration is negative.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::TrackingError;
use crate::membership::MembershipDelta;
use crate::models::{DwellInterval, PositionSample, ZoneEvent, ZoneEventType};
use crate::store::DocumentStore;

pub struct EventEmitter {
    store: Arc<dyn DocumentStore>,
}

impl EventEmitter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record the events for one sample's membership delta.
    ///
    /// Exits are written before enters. Each event is its own write; a failure
    /// is logged and the remaining events are still attempted. Returns the
    /// events that were stored.
    pub fn emit(&self, sample: &PositionSample, delta: &MembershipDelta) -> Vec<ZoneEvent> {
        let mut stored = Vec::with_capacity(delta.entered.len() + delta.exited.len());

        for zone_id in &delta.exited {
            match self.record_exit(sample, zone_id) {
                Ok(event) => stored.push(event),
                Err(e) => tracing::warn!(object_id = %sample.object_id, zone_id = %zone_id, "{}", e),
            }
        }

        for zone_id in &delta.entered {
            match self.record_enter(sample, zone_id) {
                Ok(event) => stored.push(event),
                Err(e) => tracing::warn!(object_id = %sample.object_id, zone_id = %zone_id, "{}", e),
            }
        }

        stored
    }

    fn record_enter(
        &self,
        sample: &PositionSample,
        zone_id: &str,
    ) -> Result<ZoneEvent, TrackingError> {
        let event = ZoneEvent::new(
            &sample.object_id,
            zone_id,
            ZoneEventType::Enter,
            sample.timestamp,
            sample.point(),
        );
        self.store
            .insert_zone_event(&event)
            .map_err(|e| TrackingError::durable("zone_events", e))?;

        tracing::info!(object_id = %sample.object_id, zone_id = %zone_id, "Object entered zone");
        Ok(event)
    }

    fn record_exit(
        &self,
        sample: &PositionSample,
        zone_id: &str,
    ) -> Result<ZoneEvent, TrackingError> {
        let event = ZoneEvent::new(
            &sample.object_id,
            zone_id,
            ZoneEventType::Exit,
            sample.timestamp,
            sample.point(),
        );
        self.store
            .insert_zone_event(&event)
            .map_err(|e| TrackingError::durable("zone_events", e))?;

        tracing::info!(object_id = %sample.object_id, zone_id = %zone_id, "Object exited zone");

        let enter = self
            .store
            .latest_unmatched_enter(&sample.object_id, zone_id)
            .map_err(|e| TrackingError::durable("zone_events", e))?;

        match enter {
            Some(enter) => {
                let duration = seconds_between(enter.timestamp, sample.timestamp);
                if duration < 0.0 {
                    tracing::warn!(
                        object_id = %sample.object_id,
                        zone_id = %zone_id,
                        duration,
                        "Exit is stamped before its enter"
                    );
                }
                self.store
                    .set_event_duration(enter.id, duration)
                    .map_err(|e| TrackingError::durable("zone_events", e))?;
                tracing::debug!(
                    object_id = %sample.object_id,
                    zone_id = %zone_id,
                    duration,
                    "Matched exit to enter"
                );
            }
            None => {
                tracing::debug!(
                    object_id = %sample.object_id,
                    zone_id = %zone_id,
                    "Unmatched exit, no open enter found"
                );
            }
        }

        Ok(event)
    }
}

/// Elapsed seconds from `start` to `end`.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Fold zone events (oldest first) into dwell intervals, one per stay.
///
/// An enter opens an interval for its zone; the next exit for that zone closes
/// it. Intervals still open at the end have no exit. An exit with nothing open
/// becomes an interval with no enter.
pub fn replay_dwell(events: &[ZoneEvent]) -> Vec<DwellInterval> {
    let mut intervals: Vec<DwellInterval> = Vec::new();
    let mut open: HashMap<&str, usize> = HashMap::new();

    for event in events {
        match event.event_type {
            ZoneEventType::Enter => {
                open.insert(&event.zone_id, intervals.len());
                intervals.push(DwellInterval {
                    zone_id: event.zone_id.clone(),
                    entered_at: Some(event.timestamp),
                    exited_at: None,
                    duration_secs: None,
                });
            }
            ZoneEventType::Exit => match open.remove(event.zone_id.as_str()) {
                Some(index) => {
                    let interval = &mut intervals[index];
                    interval.exited_at = Some(event.timestamp);
                    interval.duration_secs = interval
                        .entered_at
                        .map(|entered| seconds_between(entered, event.timestamp));
                }
                None => intervals.push(DwellInterval {
                    zone_id: event.zone_id.clone(),
                    entered_at: None,
                    exited_at: Some(event.timestamp),
                    duration_secs: None,
                }),
            },
        }
    }

    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn event(zone: &str, event_type: ZoneEventType, secs: i64) -> ZoneEvent {
        ZoneEvent::new("obj_1", zone, event_type, at(secs), Point::new(0.0, 0.0))
    }

    #[test]
    fn test_seconds_between_keeps_sub_second_precision() {
        let start = at(100);
        let end = start + chrono::Duration::milliseconds(2_500);
        assert_eq!(seconds_between(start, end), 2.5);
        assert_eq!(seconds_between(end, start), -2.5);
    }

    #[test]
    fn test_replay_pairs_enters_with_exits() {
        let events = vec![
            event("a", ZoneEventType::Enter, 10),
            event("b", ZoneEventType::Enter, 12),
            event("a", ZoneEventType::Exit, 20),
            event("a", ZoneEventType::Enter, 30),
        ];

        let intervals = replay_dwell(&events);

        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].zone_id, "a");
        assert_eq!(intervals[0].duration_secs, Some(10.0));
        assert_eq!(intervals[1].zone_id, "b");
        assert_eq!(intervals[1].exited_at, None);
        assert_eq!(intervals[2].entered_at, Some(at(30)));
        assert_eq!(intervals[2].duration_secs, None);
    }

    #[test]
    fn test_replay_keeps_orphan_exit() {
        let intervals = replay_dwell(&[event("a", ZoneEventType::Exit, 5)]);

        assert_eq!(
            intervals,
            vec![DwellInterval {
                zone_id: "a".to_string(),
                entered_at: None,
                exited_at: Some(at(5)),
                duration_secs: None,
            }]
        );
    }
}
