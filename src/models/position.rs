use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurement name for raw position points in the time-series store.
pub const POSITION_MEASUREMENT: &str = "object_position";

/// A planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One position report for a tracked object.
///
/// Samples are produced by the transport and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub object_id: String,
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(object_id: impl Into<String>, x: f64, y: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            object_id: object_id.into(),
            x,
            y,
            timestamp,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Returns the reason this sample cannot be processed, if any.
    pub fn validation_error(&self) -> Option<&'static str> {
        if self.object_id.trim().is_empty() {
            Some("missing object id")
        } else if !self.x.is_finite() {
            Some("x is not a finite number")
        } else if !self.y.is_finite() {
            Some("y is not a finite number")
        } else {
            None
        }
    }
}

/// A sample shaped for the time-series store: one point per sample, tagged by
/// object id, with `x`/`y` fields and a nanosecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPoint {
    pub measurement: String,
    pub object_id: String,
    pub x: f64,
    pub y: f64,
    pub timestamp_ns: i64,
}

impl PositionPoint {
    /// Render as a line-protocol record:
    /// `object_position,object_id=<id> x=<x>,y=<y> <ns>`.
    pub fn to_line_protocol(&self) -> String {
        format!(
            "{},object_id={} x={},y={} {}",
            self.measurement,
            escape_tag(&self.object_id),
            self.x,
            self.y,
            self.timestamp_ns
        )
    }
}

impl From<&PositionSample> for PositionPoint {
    fn from(sample: &PositionSample) -> Self {
        Self {
            measurement: POSITION_MEASUREMENT.to_string(),
            object_id: sample.object_id.clone(),
            x: sample.x,
            y: sample.y,
            timestamp_ns: timestamp_ns(sample.timestamp),
        }
    }
}

/// Stored position read back from the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

/// Nanoseconds since the unix epoch, saturating outside the representable range.
pub fn timestamp_ns(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000))
}

pub fn from_timestamp_ns(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(ns)
}

fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
