use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Point;

/// A zone transition for one object.
///
/// Zone events are append-only. The single exception is `duration` on an enter
/// event, which is filled in once when the matching exit is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub id: Uuid,
    pub object_id: String,
    pub zone_id: String,
    pub event_type: ZoneEventType,
    pub timestamp: DateTime<Utc>,
    /// Entry point for enters, exit point for exits.
    pub point: Point,
    /// Dwell time in seconds, set on an enter once its exit is known.
    pub duration: Option<f64>,
}

impl ZoneEvent {
    pub fn new(
        object_id: impl Into<String>,
        zone_id: impl Into<String>,
        event_type: ZoneEventType,
        timestamp: DateTime<Utc>,
        point: Point,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_id: object_id.into(),
            zone_id: zone_id.into(),
            event_type,
            timestamp,
            point,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ZoneEventType {
    Enter,
    Exit,
}

impl ZoneEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "enter" => Some(Self::Enter),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// An appearance or disappearance of a tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub id: Uuid,
    pub object_id: String,
    pub event_type: ObjectEventKind,
    pub timestamp: DateTime<Utc>,
    /// For appearances, when the object was last marked gone.
    pub previous_disappearance: Option<DateTime<Utc>>,
}

impl ObjectEvent {
    pub fn appearance(
        object_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        previous_disappearance: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_id: object_id.into(),
            event_type: ObjectEventKind::Appearance,
            timestamp,
            previous_disappearance,
        }
    }

    pub fn disappearance(object_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_id: object_id.into(),
            event_type: ObjectEventKind::Disappearance,
            timestamp,
            previous_disappearance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectEventKind {
    Appearance,
    Disappearance,
}

impl ObjectEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appearance => "appearance",
            Self::Disappearance => "disappearance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "appearance" => Some(Self::Appearance),
            "disappearance" => Some(Self::Disappearance),
            _ => None,
        }
    }
}

/// Filter for zone event queries. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneEventFilter {
    pub object_id: Option<String>,
    pub zone_id: Option<String>,
    pub event_type: Option<ZoneEventType>,
    pub limit: Option<u32>,
}

/// Filter for appearance/disappearance queries. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectEventFilter {
    pub object_id: Option<String>,
    pub event_type: Option<ObjectEventKind>,
    pub limit: Option<u32>,
}

/// One stay of an object inside a zone, rebuilt from its zone events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellInterval {
    pub zone_id: String,
    pub entered_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}
