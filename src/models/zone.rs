use serde::{Deserialize, Serialize};

use super::Point;
use crate::error::TrackingError;
use crate::geometry;

/// A zone as delivered by the zone configuration source.
///
/// Definitions are not validated; [`Zone::try_from`] does that when the
/// registry loads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub polygon: Vec<Point>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A validated zone: at least three finite vertices, implicitly closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub polygon: Vec<Point>,
    pub active: bool,
}

impl Zone {
    pub fn contains(&self, point: Point) -> bool {
        geometry::contains(point, &self.polygon)
    }
}

impl TryFrom<ZoneDefinition> for Zone {
    type Error = TrackingError;

    fn try_from(def: ZoneDefinition) -> Result<Self, Self::Error> {
        if def.polygon.len() < 3 {
            return Err(TrackingError::DegeneratePolygon {
                zone_id: def.id,
                vertices: def.polygon.len(),
            });
        }
        if def.polygon.iter().any(|v| !v.is_finite()) {
            return Err(TrackingError::InvalidVertex { zone_id: def.id });
        }

        Ok(Self {
            id: def.id,
            name: def.name,
            polygon: def.polygon,
            active: def.active,
        })
    }
}
