//! Error kinds produced by the ingestion core.
//!
//! None of these are fatal to the process. Each one describes a single piece of
//! work (a message, a durable write, a zone definition) that was dropped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    /// A message was missing required fields or carried invalid values.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A write to one of the durable stores failed. Only that write path is lost.
    #[error("durable write to {path} failed: {reason}")]
    DurableWrite { path: &'static str, reason: String },

    /// A zone polygon had fewer than three vertices.
    #[error("zone {zone_id} has a degenerate polygon ({vertices} vertices)")]
    DegeneratePolygon { zone_id: String, vertices: usize },

    /// A zone polygon contained a NaN or infinite coordinate.
    #[error("zone {zone_id} has a non-finite vertex")]
    InvalidVertex { zone_id: String },

    /// The zone definition source could not be read.
    #[error("zone source unavailable: {0}")]
    ZoneSource(String),

    /// The ingestion queue for a shard is full.
    #[error("ingestion queue is full")]
    QueueFull,

    /// The ingestion workers have shut down.
    #[error("ingestion pipeline is closed")]
    PipelineClosed,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl TrackingError {
    pub(crate) fn durable(path: &'static str, err: impl std::fmt::Display) -> Self {
        Self::DurableWrite {
            path,
            reason: err.to_string(),
        }
    }
}
