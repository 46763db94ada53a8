//! Per-object zone membership.
//!
//! The tracker is the state machine behind enter/exit detection. For each
//! (object, zone) pair the state is OUTSIDE until a sample lands inside the
//! zone. Each sample computes the full set of containing zones first, then
//! derives enters (new − old) and exits (old − new).
//!
//! Membership lives only in memory. After a restart every object starts
//! OUTSIDE every zone, so objects already inside a zone produce a fresh enter
//! on their first sample.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::models::Point;
use crate::zones::ZoneSet;

/// Zones entered and exited by one sample.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MembershipDelta {
    pub entered: Vec<String>,
    pub exited: Vec<String>,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MembershipTracker {
    memberships: DashMap<String, BTreeSet<String>>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `point` against `zones` and update the object's membership.
    ///
    /// Only zones present in `zones` are evaluated. Membership in a zone that
    /// has since been removed from the registry is kept as-is and produces no
    /// exit; if the zone comes back, evaluation resumes from that state.
    pub fn observe(&self, object_id: &str, point: Point, zones: &ZoneSet) -> MembershipDelta {
        let inside = zones.containing(point);

        let mut current = self.memberships.entry(object_id.to_string()).or_default();

        let entered: Vec<String> = inside.difference(&current).cloned().collect();
        let exited: Vec<String> = current
            .iter()
            .filter(|id| zones.contains_zone(id) && !inside.contains(*id))
            .cloned()
            .collect();

        current.retain(|id| !zones.contains_zone(id));
        current.extend(inside);

        MembershipDelta { entered, exited }
    }

    /// Zones the object is currently inside, in id order.
    pub fn zones_of(&self, object_id: &str) -> Vec<String> {
        self.memberships
            .get(object_id)
            .map(|zones| zones.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tracked_objects(&self) -> usize {
        self.memberships.len()
    }
}
