use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use zonetrack::api::{create_router, AppState, ObjectZones, TimeoutSettings};
use zonetrack::cache::{ActiveObjectCache, ActiveObjectEntry, TrailPoint};
use zonetrack::clock::ManualClock;
use zonetrack::db::Database;
use zonetrack::membership::MembershipTracker;
use zonetrack::models::*;
use zonetrack::pipeline::IngestionPipeline;
use zonetrack::zones::{StaticZoneSource, ZoneRegistry, ZoneSource};

const START: i64 = 1_700_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(START + secs, 0).unwrap()
}

fn zone(id: &str, x0: f64) -> ZoneDefinition {
    ZoneDefinition {
        id: id.to_string(),
        name: format!("Zone {}", id),
        description: None,
        color: Some("#00ff00".to_string()),
        polygon: vec![
            Point::new(x0, 0.0),
            Point::new(x0 + 20.0, 0.0),
            Point::new(x0 + 20.0, 20.0),
            Point::new(x0, 20.0),
        ],
        active: true,
    }
}

struct TestApp {
    server: TestServer,
    pipeline: IngestionPipeline,
    clock: ManualClock,
    source: Arc<StaticZoneSource>,
}

impl TestApp {
    fn ingest(&self, id: &str, x: f64, y: f64, secs: i64) {
        self.clock.set(at(secs));
        self.pipeline
            .process(&PositionSample::new(id, x, y, at(secs)))
            .expect("Sample rejected");
    }
}

fn setup() -> TestApp {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");

    let source = Arc::new(StaticZoneSource::new(vec![zone("A", 0.0)]));
    let registry = Arc::new(ZoneRegistry::new(source.clone()));
    registry.reload().expect("Failed to load zones");

    let clock = ManualClock::new(at(0));
    let tracker = Arc::new(MembershipTracker::new());
    let cache = Arc::new(ActiveObjectCache::new(
        Arc::new(clock.clone()),
        Duration::from_secs(5),
    ));
    let store = Arc::new(db.clone());
    let pipeline = IngestionPipeline::new(
        registry.clone(),
        tracker.clone(),
        cache.clone(),
        store.clone(),
        store,
    );

    let app = create_router(AppState {
        db,
        cache,
        tracker,
        registry,
    });

    TestApp {
        server: TestServer::new(app).expect("Failed to create test server"),
        pipeline,
        clock,
        source,
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let app = setup();
        let response = app.server.get("/api/v1/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}

mod live_objects {
    use super::*;

    #[tokio::test]
    async fn lists_only_objects_within_the_timeout() {
        let app = setup();
        app.ingest("old", 1.0, 1.0, 0);
        app.ingest("fresh", 2.0, 2.0, 10);

        let response = app.server.get("/api/v1/objects/active").await;

        response.assert_status_ok();
        let active: HashMap<String, ActiveObjectEntry> = response.json();
        assert_eq!(active.len(), 1);
        assert_eq!(active["fresh"].x, 2.0);
    }

    #[tokio::test]
    async fn returns_trimmed_trails() {
        let app = setup();
        for i in 0..10 {
            app.ingest("obj_1", i as f64, 0.0, 1);
        }

        let response = app
            .server
            .get("/api/v1/objects/trails")
            .add_query_param("max_points", 3)
            .await;
        response.assert_status_ok();
        let trails: HashMap<String, Vec<TrailPoint>> = response.json();
        let xs: Vec<f64> = trails["obj_1"].iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![7.0, 8.0, 9.0]);

        let single = app.server.get("/api/v1/objects/obj_1/trail").await;
        single.assert_status_ok();
        assert_eq!(single.json::<Vec<TrailPoint>>().len(), 10);
    }

    #[tokio::test]
    async fn trail_of_unknown_object_is_not_found() {
        let app = setup();
        let response = app.server.get("/api/v1/objects/ghost/trail").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}

mod settings {
    use super::*;

    #[tokio::test]
    async fn changing_the_timeout_changes_liveness() {
        let app = setup();
        app.ingest("obj_1", 1.0, 1.0, 0);
        app.clock.set(at(20));

        let before = app.server.get("/api/v1/objects/active").await;
        assert!(before.json::<HashMap<String, ActiveObjectEntry>>().is_empty());

        let response = app
            .server
            .put("/api/v1/settings/timeout")
            .json(&TimeoutSettings { timeout_secs: 30.0 })
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<TimeoutSettings>().timeout_secs, 30.0);

        let current = app.server.get("/api/v1/settings/timeout").await;
        assert_eq!(current.json::<TimeoutSettings>().timeout_secs, 30.0);

        let after = app.server.get("/api/v1/objects/active").await;
        assert_eq!(after.json::<HashMap<String, ActiveObjectEntry>>().len(), 1);
    }

    #[tokio::test]
    async fn rejects_a_negative_timeout() {
        let app = setup();
        let response = app
            .server
            .put("/api/v1/settings/timeout")
            .json(&TimeoutSettings { timeout_secs: -1.0 })
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

mod objects {
    use super::*;

    #[tokio::test]
    async fn lists_and_fetches_records() {
        let app = setup();
        app.ingest("obj_1", 1.0, 1.0, 0);
        app.ingest("obj_2", 2.0, 2.0, 1);

        let all = app.server.get("/api/v1/objects").await;
        all.assert_status_ok();
        assert_eq!(all.json::<Vec<ObjectRecord>>().len(), 2);

        let active = app
            .server
            .get("/api/v1/objects")
            .add_query_param("status", "active")
            .add_query_param("limit", 1)
            .await;
        assert_eq!(active.json::<Vec<ObjectRecord>>().len(), 1);

        let one = app.server.get("/api/v1/objects/obj_2").await;
        one.assert_status_ok();
        let record: ObjectRecord = one.json();
        assert_eq!(record.last_position, Point::new(2.0, 2.0));

        app.server
            .get("/api/v1/objects/missing")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn returns_position_history_in_range() {
        let app = setup();
        for secs in 0..5 {
            app.ingest("obj_1", secs as f64, 0.0, secs);
        }

        let response = app
            .server
            .get("/api/v1/objects/obj_1/history")
            .add_query_param("start", at(1).to_rfc3339())
            .add_query_param("end", at(3).to_rfc3339())
            .await;

        response.assert_status_ok();
        let history: Vec<PositionRecord> = response.json();
        let xs: Vec<f64> = history.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn reports_membership_and_dwell_intervals() {
        let app = setup();
        app.ingest("obj_1", 10.0, 10.0, 0);
        app.ingest("obj_1", 30.0, 10.0, 4);
        app.ingest("obj_1", 15.0, 10.0, 6);

        let response = app.server.get("/api/v1/objects/obj_1/zones").await;

        response.assert_status_ok();
        let zones: ObjectZones = response.json();
        assert_eq!(zones.current_zones, vec!["A".to_string()]);
        assert_eq!(zones.intervals.len(), 2);
        assert_eq!(zones.intervals[0].duration_secs, Some(4.0));
        assert_eq!(zones.intervals[1].entered_at, Some(at(6)));
        assert_eq!(zones.intervals[1].exited_at, None);
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn filters_zone_events() {
        let app = setup();
        app.ingest("obj_1", 10.0, 10.0, 0);
        app.ingest("obj_1", 30.0, 10.0, 2);
        app.ingest("obj_2", 10.0, 10.0, 3);

        let all = app.server.get("/api/v1/zone-events").await;
        all.assert_status_ok();
        let events: Vec<ZoneEvent> = all.json();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].object_id, "obj_2");

        let exits = app
            .server
            .get("/api/v1/zone-events")
            .add_query_param("event_type", "exit")
            .add_query_param("zone_id", "A")
            .await;
        let exits: Vec<ZoneEvent> = exits.json();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].object_id, "obj_1");

        let for_obj_2 = app
            .server
            .get("/api/v1/zone-events")
            .add_query_param("object_id", "obj_2")
            .await;
        assert_eq!(for_obj_2.json::<Vec<ZoneEvent>>().len(), 1);
    }

    #[tokio::test]
    async fn lists_object_events() {
        let app = setup();
        let response = app.server.get("/api/v1/events").await;

        response.assert_status_ok();
        assert!(response.json::<Vec<ObjectEvent>>().is_empty());
    }
}

mod zones {
    use super::*;

    #[tokio::test]
    async fn lists_and_reloads_zones() {
        let app = setup();

        let before: Vec<Zone> = app.server.get("/api/v1/zones").await.json();
        assert_eq!(before.len(), 1);

        app.source.replace(vec![zone("A", 0.0), zone("B", 40.0)]);
        assert_eq!(app.source.load_zone_definitions().unwrap().len(), 2);

        let reload = app.server.post("/api/v1/zones/reload").await;
        reload.assert_status_ok();
        let body: serde_json::Value = reload.json();
        assert_eq!(body["zones"], 2);

        let after: Vec<Zone> = app.server.get("/api/v1/zones").await.json();
        let ids: Vec<&str> = after.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
