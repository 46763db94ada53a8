//! In-memory view of where every object is right now.
//!
//! The cache keeps the last position and a bounded history per object. Entries
//! are never removed; liveness is decided at read time by comparing each
//! entry's `last_update` against the current timeout. Memory therefore grows
//! with the number of distinct object ids ever seen.
//!
//! Entries live in a `DashMap`, so a writer only locks the shard holding the
//! object it updates and readers never wait on more than one entry's update.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Maximum history points retained per object.
pub const MAX_HISTORY_POINTS: usize = 100;

/// Default liveness window.
pub const DEFAULT_ACTIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of points returned per trail.
pub const DEFAULT_TRAIL_POINTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
}

/// Last known position of one object plus its recent history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveObjectEntry {
    pub object_id: String,
    pub x: f64,
    pub y: f64,
    pub last_update: DateTime<Utc>,
    pub history: VecDeque<HistoryPoint>,
}

impl ActiveObjectEntry {
    fn trail(&self, max_points: usize) -> Vec<TrailPoint> {
        let skip = self.history.len().saturating_sub(max_points);
        self.history
            .iter()
            .skip(skip)
            .map(|p| TrailPoint { x: p.x, y: p.y })
            .collect()
    }
}

pub struct ActiveObjectCache {
    entries: DashMap<String, ActiveObjectEntry>,
    /// Liveness window in nanoseconds, read on every filter pass.
    timeout_ns: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl ActiveObjectCache {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            timeout_ns: AtomicU64::new(duration_to_ns(timeout)),
            clock,
        }
    }

    /// Record a new position for `object_id` at the clock's current time.
    pub fn update(&self, object_id: &str, x: f64, y: f64) {
        let now = self.clock.now();
        let point = HistoryPoint {
            x,
            y,
            timestamp: now,
        };

        match self.entries.get_mut(object_id) {
            Some(mut entry) => {
                entry.x = x;
                entry.y = y;
                entry.last_update = now;
                entry.history.push_back(point);
                while entry.history.len() > MAX_HISTORY_POINTS {
                    entry.history.pop_front();
                }
            }
            None => {
                let mut history = VecDeque::with_capacity(MAX_HISTORY_POINTS);
                history.push_back(point);
                self.entries.insert(
                    object_id.to_string(),
                    ActiveObjectEntry {
                        object_id: object_id.to_string(),
                        x,
                        y,
                        last_update: now,
                        history,
                    },
                );
            }
        }
    }

    /// Every object updated within the timeout.
    pub fn active_objects(&self) -> HashMap<String, ActiveObjectEntry> {
        let now = self.clock.now();
        let timeout = self.timeout();
        self.entries
            .iter()
            .filter(|entry| is_live(entry.last_update, now, timeout))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Recent positions of every live object, at most `max_points` each,
    /// ending with the newest.
    pub fn trails(&self, max_points: usize) -> HashMap<String, Vec<TrailPoint>> {
        let now = self.clock.now();
        let timeout = self.timeout();
        self.entries
            .iter()
            .filter(|entry| is_live(entry.last_update, now, timeout))
            .map(|entry| (entry.key().clone(), entry.trail(max_points)))
            .collect()
    }

    /// Trail of a single live object.
    pub fn trail(&self, object_id: &str, max_points: usize) -> Option<Vec<TrailPoint>> {
        self.get(object_id).map(|entry| entry.trail(max_points))
    }

    /// A single object, if it is live.
    pub fn get(&self, object_id: &str) -> Option<ActiveObjectEntry> {
        let now = self.clock.now();
        let timeout = self.timeout();
        self.entries
            .get(object_id)
            .filter(|entry| is_live(entry.last_update, now, timeout))
            .map(|entry| entry.value().clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.timeout_ns.load(Ordering::Relaxed))
    }

    /// Change the liveness window. Takes effect on the next read.
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ns
            .store(duration_to_ns(timeout), Ordering::Relaxed);
    }

    /// Number of objects ever seen, live or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn duration_to_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Live means `now - last_update <= timeout`. Updates stamped in the future
/// (clock skew) count as live.
fn is_live(last_update: DateTime<Utc>, now: DateTime<Utc>, timeout: Duration) -> bool {
    match (now - last_update).to_std() {
        Ok(age) => age <= timeout,
        Err(_) => true,
    }
}
