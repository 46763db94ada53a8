use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::TrackingError;
use crate::models::{Point, Zone, ZoneDefinition};

/// Anything that can list zone definitions.
pub trait ZoneSource: Send + Sync {
    fn load_zone_definitions(&self) -> anyhow::Result<Vec<ZoneDefinition>>;
}

/// An immutable set of validated, active zones keyed by id.
#[derive(Debug, Default, Clone)]
pub struct ZoneSet {
    zones: BTreeMap<String, Zone>,
}

impl ZoneSet {
    /// Build a set from raw definitions.
    ///
    /// Inactive definitions are skipped. Invalid ones are returned alongside
    /// the set so the caller can report them; they never reach evaluation.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ZoneDefinition>,
    ) -> (Self, Vec<TrackingError>) {
        let mut zones = BTreeMap::new();
        let mut rejected = Vec::new();

        for def in definitions.into_iter().filter(|d| d.active) {
            match Zone::try_from(def) {
                Ok(zone) => {
                    zones.insert(zone.id.clone(), zone);
                }
                Err(e) => rejected.push(e),
            }
        }

        (Self { zones }, rejected)
    }

    pub fn get(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.get(zone_id)
    }

    pub fn contains_zone(&self, zone_id: &str) -> bool {
        self.zones.contains_key(zone_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Ids of every zone whose polygon contains `point`.
    pub fn containing(&self, point: Point) -> BTreeSet<String> {
        self.zones
            .values()
            .filter(|zone| zone.contains(point))
            .map(|zone| zone.id.clone())
            .collect()
    }
}

/// Holds the current [`ZoneSet`] and swaps it atomically on reload.
///
/// Readers take an `Arc` snapshot and evaluate against it without holding the
/// lock, so a reload never exposes a half-built set. Loading from the source
/// happens before the write lock is taken.
///
/// Removing a zone does not close open memberships: objects inside it are
/// simply no longer evaluated against it and no exit is generated.
pub struct ZoneRegistry {
    source: Arc<dyn ZoneSource>,
    current: RwLock<Arc<ZoneSet>>,
}

impl ZoneRegistry {
    /// Create an empty registry. Call [`reload`](Self::reload) to populate it.
    pub fn new(source: Arc<dyn ZoneSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(ZoneSet::default())),
        }
    }

    /// Read active zones from the source and validate them.
    pub fn load(&self) -> Result<ZoneSet, TrackingError> {
        let definitions = self
            .source
            .load_zone_definitions()
            .map_err(|e| TrackingError::ZoneSource(e.to_string()))?;

        let (set, rejected) = ZoneSet::from_definitions(definitions);
        for err in rejected {
            tracing::warn!("Excluding zone: {}", err);
        }
        Ok(set)
    }

    /// Replace the current zone set. On failure the previous set stays in place.
    pub fn reload(&self) -> Result<usize, TrackingError> {
        let set = self.load()?;
        let count = set.len();
        self.install(set);
        tracing::debug!(zones = count, "Zone registry reloaded");
        Ok(count)
    }

    /// Swap in an already-built set.
    pub fn install(&self, set: ZoneSet) {
        *self.current.write() = Arc::new(set);
    }

    /// The zone set every evaluation of one sample should use.
    pub fn snapshot(&self) -> Arc<ZoneSet> {
        Arc::clone(&self.current.read())
    }
}

/// A zone source backed by an in-memory list, replaceable at runtime.
#[derive(Default)]
pub struct StaticZoneSource {
    definitions: RwLock<Vec<ZoneDefinition>>,
}

impl StaticZoneSource {
    pub fn new(definitions: Vec<ZoneDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
        }
    }

    pub fn replace(&self, definitions: Vec<ZoneDefinition>) {
        *self.definitions.write() = definitions;
    }
}

impl ZoneSource for StaticZoneSource {
    fn load_zone_definitions(&self) -> anyhow::Result<Vec<ZoneDefinition>> {
        Ok(self.definitions.read().clone())
    }
}
