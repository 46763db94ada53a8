//! Write/read contracts for the durable stores.
//!
//! The pipeline only talks to these traits. [`crate::db::Database`] implements
//! both on SQLite; tests substitute failing or recording stores to exercise the
//! independent failure domains of ingestion.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ObjectEvent, ObjectRecord, PositionPoint, PositionSample, ZoneEvent};

/// Time-series store for raw position samples.
pub trait PositionSeries: Send + Sync {
    fn write_position(&self, point: &PositionPoint) -> Result<()>;
}

/// Document store for object records and event logs.
pub trait DocumentStore: Send + Sync {
    /// Update `last_position`/`last_updated`, inserting `first_seen` and
    /// status `active` for new objects. Returns the record as it was before.
    fn upsert_object(&self, sample: &PositionSample) -> Result<Option<ObjectRecord>>;

    /// Flip a `gone` object back to `active`. Returns false if it was not gone.
    fn mark_active(&self, object_id: &str) -> Result<bool>;

    /// Flip an `active` object to `gone` if it has not been updated since
    /// `cutoff`. Returns false if a newer sample arrived in the meantime.
    fn mark_gone(&self, object_id: &str, cutoff: DateTime<Utc>, at: DateTime<Utc>)
        -> Result<bool>;

    /// Active objects whose last update is older than `cutoff`.
    fn stale_active_objects(&self, cutoff: DateTime<Utc>) -> Result<Vec<ObjectRecord>>;

    fn insert_zone_event(&self, event: &ZoneEvent) -> Result<()>;

    /// The most recently recorded enter for the pair with no duration.
    ///
    /// Recency is insertion order, not timestamp, so a skewed exit still closes
    /// the stay that is actually open.
    fn latest_unmatched_enter(&self, object_id: &str, zone_id: &str)
        -> Result<Option<ZoneEvent>>;

    fn set_event_duration(&self, event_id: Uuid, duration_secs: f64) -> Result<bool>;

    fn insert_object_event(&self, event: &ObjectEvent) -> Result<()>;
}
