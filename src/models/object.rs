use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Point;

/// Durable record of a tracked object, upserted on every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: String,
    pub last_position: Point,
    pub last_updated: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub status: ObjectStatus,
    pub last_disappearance: Option<DateTime<Utc>>,
}

/// Whether an object is currently reporting.
///
/// - `Active`: updates are arriving
/// - `Gone`: no update within the disappearance window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Active,
    Gone,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Gone => "gone",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "gone" => Some(Self::Gone),
            _ => None,
        }
    }
}
