use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use gts_api::middleware::issue_token;
use gts_api::{app, AppState, AuthConfig};
use gts_core::location::{CapacityRecord, Corridor, Location};
use gts_core::{EngineSettings, InMemoryStore, RecordingNotifier, Repositories, Role};
use gts_catalog::CapacityLedger;
use gts_shared::events::OpsFeedEvent;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<InMemoryStore>,
    corridor: Corridor,
    stops: Vec<Location>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let corridor = Corridor::new("I-95 Northeast");
    store.add_corridor(corridor.clone()).await;

    let mut stops = vec![
        Location::new(corridor.id, "Pilot Travel Center Newark", 40.7357, -74.1724, 1),
        Location::new(corridor.id, "Love's Philadelphia", 39.9526, -75.1652, 2),
        Location::new(corridor.id, "TA Baltimore", 39.2904, -76.6122, 3),
    ];
    stops[1].admin_id = Some("attendant-1".to_string());
    for stop in &stops {
        store.add_location(stop.clone()).await;
    }

    let state = AppState::new(
        Repositories::from_store(store.clone()),
        &EngineSettings::default(),
        AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        16,
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap();

    TestApp {
        router: app(state.clone()),
        state,
        store,
        corridor,
        stops,
    }
}

fn token(sub: &str, role: Role) -> String {
    issue_token(SECRET, sub, role, 3600).unwrap()
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let request = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_reservation(&self, driver: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/v1/reservations",
                Some(&token(driver, Role::Driver)),
                Some(json!({
                    "corridor_id": self.corridor.id,
                    "start_eta": Utc::now() + Duration::hours(3),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

#[tokio::test]
async fn test_health_and_metrics_are_public() {
    let app = test_app().await;

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("gts_http_requests_total"));
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = test_app().await;

    let (status, _) = app.call("GET", "/v1/corridors", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = issue_token("some-other-secret", "driver-1", Role::Driver, 3600).unwrap();
    let (status, _) = app.call("GET", "/v1/corridors", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call("GET", "/v1/corridors", Some(&token("driver-1", Role::Driver)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_driver_books_and_sees_reservation() {
    let app = test_app().await;
    let mut feed = app.state.feed_tx.subscribe();

    let reservation = app.create_reservation("driver-1").await;
    assert_eq!(reservation["status"], "CONFIRMED");
    assert!(reservation["confirmation_code"].as_str().unwrap().starts_with("GTS-"));

    match feed.recv().await.unwrap() {
        OpsFeedEvent::Confirmed(event) => assert_eq!(event.driver_id, "driver-1"),
        other => panic!("unexpected feed event {:?}", other),
    }

    let driver = token("driver-1", Role::Driver);
    let (status, mine) = app.call("GET", "/v1/reservations/mine", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let id = reservation["id"].as_str().unwrap();
    let (status, details) = app
        .call("GET", &format!("/v1/reservations/{}", id), Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["check_in_events"].as_array().unwrap().len(), 0);

    let code = reservation["confirmation_code"].as_str().unwrap();
    let (status, by_code) = app
        .call("GET", &format!("/v1/reservations/code/{}", code), Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code["id"], reservation["id"]);
}

#[tokio::test]
async fn test_role_checks_return_forbidden() {
    let app = test_app().await;
    let reservation = app.create_reservation("driver-1").await;
    let id = reservation["id"].as_str().unwrap();
    let driver = token("driver-1", Role::Driver);

    let (status, _) = app.call("GET", "/v1/reservations", Some(&driver), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call("POST", &format!("/v1/reservations/{}/rescue", id), Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("GET", "/v1/ops/stream", Some(&driver), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            "POST",
            "/v1/reservations",
            Some(&token("ops-1", Role::Ops)),
            Some(json!({ "corridor_id": app.corridor.id, "start_eta": Utc::now() })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_corridor_is_a_conflict() {
    let app = test_app().await;
    for stop in &app.stops {
        app.store
            .put_capacity(CapacityRecord::new(stop.id, CapacityLedger::today(), 5, 1, 4))
            .await;
    }

    let (status, body) = app
        .call(
            "POST",
            "/v1/reservations",
            Some(&token("driver-1", Role::Driver)),
            Some(json!({ "corridor_id": app.corridor.id, "start_eta": Utc::now() + Duration::hours(2) })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Only 0 locations available"));
}

#[tokio::test]
async fn test_far_check_in_is_unprocessable_and_cancel_twice_conflicts() {
    let app = test_app().await;
    let reservation = app.create_reservation("driver-1").await;
    let id = reservation["id"].as_str().unwrap();
    let driver = token("driver-1", Role::Driver);

    // Times Square is well outside every geofence on the corridor
    let (status, body) = app
        .call(
            "POST",
            "/v1/check-in/driver",
            Some(&driver),
            Some(json!({ "reservation_id": id, "lat": 40.7580, "lng": -73.9855, "type": "ARRIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Too far from location"));

    let (status, canceled) = app
        .call("PUT", &format!("/v1/reservations/{}/cancel", id), Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "CANCELED");

    let (status, _) = app
        .call("PUT", &format!("/v1/reservations/{}/cancel", id), Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_attendant_checks_in_driver_by_code() {
    let app = test_app().await;
    let reservation = app.create_reservation("driver-1").await;
    let code = reservation["confirmation_code"].as_str().unwrap();
    let primary = reservation["primary_location_id"].as_str().unwrap();

    // Philadelphia is the middle stop, so it is the default primary
    assert_eq!(primary, app.stops[1].id.to_string());

    let (status, body) = app
        .call(
            "POST",
            "/v1/check-in/location",
            Some(&token("attendant-1", Role::LocationAdmin)),
            Some(json!({ "confirmation_code": code, "location_id": primary })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "CHECKED_IN");
    assert_eq!(body["event"]["type"], "ARRIVE");
}

#[tokio::test]
async fn test_ops_rescue_logs_incident() {
    let app = test_app().await;
    let reservation = app.create_reservation("driver-1").await;
    let id = reservation["id"].as_str().unwrap();
    let ops = token("ops-1", Role::Ops);

    let (status, body) = app
        .call("POST", &format!("/v1/reservations/{}/rescue", id), Some(&ops), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "backup");
    assert_eq!(body["reservation"]["status"], "REASSIGNED");
    assert_eq!(body["reservation"]["primary_location_id"], reservation["backup_location_id"]);
    assert_eq!(body["incident"]["type"], "RESCUE_PROTOCOL");

    let (status, incidents) = app.call("GET", "/v1/incidents", Some(&ops), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(incidents.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_attendant_logs_eta_drift_incident() {
    let app = test_app().await;
    let reservation = app.create_reservation("driver-1").await;
    let id = reservation["id"].as_str().unwrap();
    let mut feed = app.state.feed_tx.subscribe();
    let body = json!({ "reservation_id": id, "type": "ETA_DRIFT", "notes": "Driver 90 minutes behind" });

    let (status, _) = app
        .call("POST", "/v1/incidents", Some(&token("driver-1", Role::Driver)), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, incident) = app
        .call("POST", "/v1/incidents", Some(&token("attendant-1", Role::LocationAdmin)), Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", incident);
    assert_eq!(incident["type"], "ETA_DRIFT");
    assert_eq!(incident["created_by"], "attendant-1");

    match feed.recv().await.unwrap() {
        OpsFeedEvent::Incident(event) => assert_eq!(event.incident_type, "ETA_DRIFT"),
        other => panic!("unexpected feed event {:?}", other),
    }

    let unknown = json!({ "reservation_id": uuid::Uuid::new_v4(), "type": "ETA_DRIFT", "notes": "late" });
    let (status, _) = app
        .call("POST", "/v1/incidents", Some(&token("ops-1", Role::Ops)), Some(unknown))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = app
        .call("GET", &format!("/v1/reservations/{}/incidents", id), Some(&token("ops-1", Role::Ops)), None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["notes"], "Driver 90 minutes behind");
}

#[tokio::test]
async fn test_location_admin_sets_capacity_for_own_stop_only() {
    let app = test_app().await;
    let attendant = token("attendant-1", Role::LocationAdmin);

    let (status, record) = app
        .call(
            "PUT",
            &format!("/v1/locations/{}/capacity", app.stops[1].id),
            Some(&attendant),
            Some(json!({ "total_spots": 30, "holdback_spots": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["total_spots"], 30);

    let (status, _) = app
        .call(
            "PUT",
            &format!("/v1/locations/{}/capacity", app.stops[0].id),
            Some(&attendant),
            Some(json!({ "total_spots": 30 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            "PUT",
            &format!("/v1/locations/{}/capacity", app.stops[1].id),
            Some(&attendant),
            Some(json!({ "total_spots": 2, "holdback_spots": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_geofence_check_and_hos_override() {
    let app = test_app().await;
    let driver = token("driver-9", Role::Driver);

    let (status, check) = app
        .call(
            "POST",
            "/v1/check-in/geofence",
            Some(&driver),
            Some(json!({ "lat": 39.9526, "lng": -75.1652, "location_lat": 39.9526, "location_lng": -75.1652 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["valid"], true);

    let (status, hos) = app.call("GET", "/v1/hos/me", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hos["source"], "DEFAULT");
    assert_eq!(hos["hours_remaining"], 3.5);

    let (status, hos) = app
        .call("PUT", "/v1/hos/me", Some(&driver), Some(json!({ "hours_remaining": 1.25 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hos["source"], "MANUAL");
    assert_eq!(hos["minutes_remaining"], 75.0);
}
