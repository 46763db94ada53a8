mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;
use crate::store::{DocumentStore, PositionSeries};
use crate::zones::ZoneSource;

/// Default row limit for list queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

const OBJECT_COLUMNS: &str =
    "object_id, last_x, last_y, last_updated_ns, first_seen_ns, status, last_disappearance_ns";

const ZONE_EVENT_COLUMNS: &str = "id, object_id, zone_id, event_type, timestamp_ns, x, y, duration";

const OBJECT_EVENT_COLUMNS: &str =
    "id, object_id, event_type, timestamp_ns, previous_disappearance_ns";

/// SQLite-backed durable store.
///
/// Holds the time-series table of raw positions alongside the object records,
/// zone definitions and event logs. Cloning shares the same connection.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "zonetrack")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("zonetrack.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Position time series
    // ============================================================

    /// Stored samples for one object, oldest first, optionally bounded in time.
    pub fn position_history(
        &self,
        object_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PositionRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT x, y, timestamp_ns FROM object_positions
             WHERE object_id = ? AND timestamp_ns >= ? AND timestamp_ns <= ?
             ORDER BY timestamp_ns",
        )?;

        let records = stmt
            .query_map(
                (
                    object_id,
                    start.map(timestamp_ns).unwrap_or(i64::MIN),
                    end.map(timestamp_ns).unwrap_or(i64::MAX),
                ),
                |row| {
                    Ok(PositionRecord {
                        x: row.get(0)?,
                        y: row.get(1)?,
                        timestamp: from_timestamp_ns(row.get(2)?),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ============================================================
    // Object operations
    // ============================================================

    pub fn get_object(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let record = conn
            .query_row(
                &format!("SELECT {} FROM objects WHERE object_id = ?", OBJECT_COLUMNS),
                [object_id],
                object_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_objects(
        &self,
        status: Option<ObjectStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<ObjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        let objects = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM objects WHERE status = ? ORDER BY object_id LIMIT ?",
                    OBJECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map((status.as_str(), limit), object_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM objects ORDER BY object_id LIMIT ?",
                    OBJECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([limit], object_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(objects)
    }

    // ============================================================
    // Zone operations
    // ============================================================

    /// Insert or replace a zone definition.
    pub fn upsert_zone(&self, zone: &ZoneDefinition) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO zones (id, name, description, color, polygon, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                color = excluded.color,
                polygon = excluded.polygon,
                active = excluded.active,
                updated_at = excluded.updated_at",
            (
                &zone.id,
                &zone.name,
                &zone.description,
                &zone.color,
                serde_json::to_string(&zone.polygon)?,
                zone.active,
                &now,
            ),
        )?;

        Ok(())
    }

    pub fn set_zone_active(&self, zone_id: &str, active: bool) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE zones SET active = ?, updated_at = ? WHERE id = ?",
            (active, Utc::now().to_rfc3339(), zone_id),
        )?;
        Ok(rows > 0)
    }

    pub fn get_zones(&self, active_only: bool) -> Result<Vec<ZoneDefinition>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let sql = if active_only {
            "SELECT id, name, description, color, polygon, active FROM zones WHERE active = 1 ORDER BY id"
        } else {
            "SELECT id, name, description, color, polygon, active FROM zones ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;

        let zones = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let polygon_json: String = row.get(4)?;
                // A corrupt polygon loads empty and is rejected as degenerate.
                let polygon = match serde_json::from_str(&polygon_json) {
                    Ok(polygon) => polygon,
                    Err(e) => {
                        tracing::warn!(zone_id = %id, "Stored polygon is corrupt: {}", e);
                        Vec::new()
                    }
                };
                Ok(ZoneDefinition {
                    id,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    color: row.get(3)?,
                    polygon,
                    active: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(zones)
    }

    // ============================================================
    // Zone event queries
    // ============================================================

    /// Zone events matching `filter`, newest first.
    pub fn zone_events(&self, filter: &ZoneEventFilter) -> Result<Vec<ZoneEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref object_id) = filter.object_id {
            clauses.push("object_id = ?");
            params.push(Box::new(object_id.clone()));
        }
        if let Some(ref zone_id) = filter.zone_id {
            clauses.push("zone_id = ?");
            params.push(Box::new(zone_id.clone()));
        }
        if let Some(event_type) = filter.event_type {
            clauses.push("event_type = ?");
            params.push(Box::new(event_type.as_str()));
        }
        params.push(Box::new(filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT)));

        let sql = format!(
            "SELECT {} FROM zone_events {} ORDER BY timestamp_ns DESC, rowid DESC LIMIT ?",
            ZONE_EVENT_COLUMNS,
            where_clause(&clauses)
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_ref.as_slice(), zone_event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Every zone event for one object, oldest first. Suitable for replay.
    pub fn object_zone_history(&self, object_id: &str) -> Result<Vec<ZoneEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM zone_events WHERE object_id = ? ORDER BY timestamp_ns ASC, rowid ASC",
            ZONE_EVENT_COLUMNS
        ))?;

        let events = stmt
            .query_map([object_id], zone_event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    // ============================================================
    // Object event queries
    // ============================================================

    /// Appearance/disappearance events matching `filter`, newest first.
    pub fn object_events(&self, filter: &ObjectEventFilter) -> Result<Vec<ObjectEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref object_id) = filter.object_id {
            clauses.push("object_id = ?");
            params.push(Box::new(object_id.clone()));
        }
        if let Some(kind) = filter.event_type {
            clauses.push("event_type = ?");
            params.push(Box::new(kind.as_str()));
        }
        params.push(Box::new(filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT)));

        let sql = format!(
            "SELECT {} FROM object_events {} ORDER BY timestamp_ns DESC, rowid DESC LIMIT ?",
            OBJECT_EVENT_COLUMNS,
            where_clause(&clauses)
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_ref.as_slice(), object_event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl PositionSeries for Database {
    fn write_position(&self, point: &PositionPoint) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO object_positions (measurement, object_id, x, y, timestamp_ns)
             VALUES (?, ?, ?, ?, ?)",
            (
                &point.measurement,
                &point.object_id,
                point.x,
                point.y,
                point.timestamp_ns,
            ),
        )?;
        Ok(())
    }
}

impl DocumentStore for Database {
    fn upsert_object(&self, sample: &PositionSample) -> Result<Option<ObjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let prior = conn
            .query_row(
                &format!("SELECT {} FROM objects WHERE object_id = ?", OBJECT_COLUMNS),
                [&sample.object_id],
                object_from_row,
            )
            .optional()?;

        conn.execute(
            "INSERT INTO objects (object_id, last_x, last_y, last_updated_ns, first_seen_ns, status)
             VALUES (?1, ?2, ?3, ?4, ?4, 'active')
             ON CONFLICT(object_id) DO UPDATE SET
                last_x = excluded.last_x,
                last_y = excluded.last_y,
                last_updated_ns = excluded.last_updated_ns",
            (
                &sample.object_id,
                sample.x,
                sample.y,
                timestamp_ns(sample.timestamp),
            ),
        )?;

        Ok(prior)
    }

    fn mark_active(&self, object_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE objects SET status = 'active' WHERE object_id = ? AND status = 'gone'",
            [object_id],
        )?;
        Ok(rows > 0)
    }

    fn mark_gone(&self, object_id: &str, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE objects SET status = 'gone', last_disappearance_ns = ?
             WHERE object_id = ? AND status = 'active' AND last_updated_ns < ?",
            (timestamp_ns(at), object_id, timestamp_ns(cutoff)),
        )?;
        Ok(rows > 0)
    }

    fn stale_active_objects(&self, cutoff: DateTime<Utc>) -> Result<Vec<ObjectRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM objects WHERE status = 'active' AND last_updated_ns < ?
             ORDER BY last_updated_ns",
            OBJECT_COLUMNS
        ))?;

        let objects = stmt
            .query_map([timestamp_ns(cutoff)], object_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(objects)
    }

    fn insert_zone_event(&self, event: &ZoneEvent) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO zone_events (id, object_id, zone_id, event_type, timestamp_ns, x, y, duration)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                event.id.to_string(),
                &event.object_id,
                &event.zone_id,
                event.event_type.as_str(),
                timestamp_ns(event.timestamp),
                event.point.x,
                event.point.y,
                event.duration,
            ),
        )?;
        Ok(())
    }

    fn latest_unmatched_enter(&self, object_id: &str, zone_id: &str) -> Result<Option<ZoneEvent>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let event = conn
            .query_row(
                &format!(
                    "SELECT {} FROM zone_events
                     WHERE object_id = ? AND zone_id = ? AND event_type = 'enter'
                       AND duration IS NULL
                     ORDER BY rowid DESC LIMIT 1",
                    ZONE_EVENT_COLUMNS
                ),
                (object_id, zone_id),
                zone_event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    fn set_event_duration(&self, event_id: Uuid, duration_secs: f64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE zone_events SET duration = ? WHERE id = ? AND duration IS NULL",
            (duration_secs, event_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    fn insert_object_event(&self, event: &ObjectEvent) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO object_events (id, object_id, event_type, timestamp_ns, previous_disappearance_ns)
             VALUES (?, ?, ?, ?, ?)",
            (
                event.id.to_string(),
                &event.object_id,
                event.event_type.as_str(),
                timestamp_ns(event.timestamp),
                event.previous_disappearance.map(timestamp_ns),
            ),
        )?;
        Ok(())
    }
}

impl ZoneSource for Database {
    fn load_zone_definitions(&self) -> Result<Vec<ZoneDefinition>> {
        self.get_zones(true)
    }
}

fn where_clause(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

fn object_from_row(row: &Row<'_>) -> rusqlite::Result<ObjectRecord> {
    Ok(ObjectRecord {
        object_id: row.get(0)?,
        last_position: Point::new(row.get(1)?, row.get(2)?),
        last_updated: from_timestamp_ns(row.get(3)?),
        first_seen: from_timestamp_ns(row.get(4)?),
        status: ObjectStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(ObjectStatus::Active),
        last_disappearance: row.get::<_, Option<i64>>(6)?.map(from_timestamp_ns),
    })
}

fn zone_event_from_row(row: &Row<'_>) -> rusqlite::Result<ZoneEvent> {
    Ok(ZoneEvent {
        id: parse_uuid(row.get::<_, String>(0)?),
        object_id: row.get(1)?,
        zone_id: row.get(2)?,
        event_type: ZoneEventType::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(ZoneEventType::Enter),
        timestamp: from_timestamp_ns(row.get(4)?),
        point: Point::new(row.get(5)?, row.get(6)?),
        duration: row.get(7)?,
    })
}

fn object_event_from_row(row: &Row<'_>) -> rusqlite::Result<ObjectEvent> {
    Ok(ObjectEvent {
        id: parse_uuid(row.get::<_, String>(0)?),
        object_id: row.get(1)?,
        event_type: ObjectEventKind::from_str(&row.get::<_, String>(2)?)
            .unwrap_or(ObjectEventKind::Appearance),
        timestamp: from_timestamp_ns(row.get(3)?),
        previous_disappearance: row.get::<_, Option<i64>>(4)?.map(from_timestamp_ns),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}
