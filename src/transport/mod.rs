//! Inbound position feed.
//!
//! The transport only decodes and enqueues. Messages look like
//! `{"id": "obj_1", "x": 1.5, "y": 2.0, "timestamp": 1700000000.25}` where
//! `timestamp` is optional unix seconds and defaults to the receipt time.

mod feed;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::TrackingError;
use crate::models::PositionSample;

pub use feed::{pump_lines, FeedClient, ReconnectPolicy};

#[derive(Debug, Deserialize)]
struct PositionMessage {
    id: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    timestamp: Option<f64>,
}

/// Decode one feed message into a sample.
pub fn decode_message(
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<PositionSample, TrackingError> {
    let message: PositionMessage = serde_json::from_slice(payload)
        .map_err(|e| TrackingError::MalformedInput(format!("invalid JSON: {}", e)))?;

    let object_id = message
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| TrackingError::MalformedInput("missing id".to_string()))?;
    let x = message
        .x
        .ok_or_else(|| TrackingError::MalformedInput("missing x".to_string()))?;
    let y = message
        .y
        .ok_or_else(|| TrackingError::MalformedInput("missing y".to_string()))?;

    let timestamp = match message.timestamp {
        Some(secs) => unix_seconds(secs).ok_or_else(|| {
            TrackingError::MalformedInput(format!("timestamp {} is out of range", secs))
        })?,
        None => received_at,
    };

    let sample = PositionSample::new(object_id, x, y, timestamp);
    if let Some(reason) = sample.validation_error() {
        return Err(TrackingError::MalformedInput(reason.to_string()));
    }
    Ok(sample)
}

/// Fractional unix seconds, kept to microsecond precision. Instants outside
/// the nanosecond range storage uses (1677 to 2262) are rejected.
fn unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64).filter(|t| t.timestamp_nanos_opt().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received() -> DateTime<Utc> {
        DateTime::from_timestamp(1_800_000_000, 0).unwrap()
    }

    #[test]
    fn test_decode_full_message() {
        let sample = decode_message(
            br#"{"id": "obj_1", "x": 10.5, "y": -3, "timestamp": 1700000000.25}"#,
            received(),
        )
        .unwrap();

        assert_eq!(sample.object_id, "obj_1");
        assert_eq!((sample.x, sample.y), (10.5, -3.0));
        assert_eq!(
            sample.timestamp,
            DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap()
        );
    }

    #[test]
    fn test_missing_timestamp_uses_receipt_time() {
        let sample = decode_message(br#"{"id": "obj_1", "x": 1, "y": 2}"#, received()).unwrap();
        assert_eq!(sample.timestamp, received());
    }

    #[test]
    fn test_rejects_incomplete_messages() {
        for payload in [
            &br#"{"x": 1, "y": 2}"#[..],
            br#"{"id": "", "x": 1, "y": 2}"#,
            br#"{"id": "obj_1", "y": 2}"#,
            br#"{"id": "obj_1", "x": 1}"#,
            br#"{"id": "obj_1", "x": "far", "y": 2}"#,
            b"not json",
        ] {
            let err = decode_message(payload, received()).unwrap_err();
            assert!(
                matches!(err, TrackingError::MalformedInput(_)),
                "unexpected error for {:?}: {}",
                String::from_utf8_lossy(payload),
                err
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_timestamp() {
        let err = decode_message(
            br#"{"id": "obj_1", "x": 1, "y": 2, "timestamp": 1e300}"#,
            received(),
        )
        .unwrap_err();
        assert!(matches!(err, TrackingError::MalformedInput(_)));
    }

    #[test]
    fn test_rejects_timestamp_past_nanosecond_range() {
        // Year 2286: a valid chrono instant, but not as i64 nanoseconds.
        let err = decode_message(
            br#"{"id": "obj_1", "x": 1, "y": 2, "timestamp": 10000000000}"#,
            received(),
        )
        .unwrap_err();
        assert!(matches!(err, TrackingError::MalformedInput(_)));

        let ok = decode_message(
            br#"{"id": "obj_1", "x": 1, "y": 2, "timestamp": 9000000000}"#,
            received(),
        )
        .unwrap();
        assert_eq!(ok.timestamp.timestamp(), 9_000_000_000);
    }
}
