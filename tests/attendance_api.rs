#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

use common::*;
use hrm_attendance::store::AttendanceStore;

fn punch_body(at: DateTime<Utc>, source: &str) -> Value {
    json!({
        "company_id": COMPANY,
        "source": source,
        "device_id": format!("device-{EMPLOYEE}"),
        "timestamp": at,
    })
}

fn post(uri: &str, auth: &str, body: Value) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header(("Authorization", auth.to_string()))
        .peer_addr(peer())
        .set_json(body)
}

fn put(uri: &str, auth: &str, body: Value) -> TestRequest {
    TestRequest::put()
        .uri(uri)
        .insert_header(("Authorization", auth.to_string()))
        .peer_addr(peer())
        .set_json(body)
}

fn get(uri: &str, auth: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .insert_header(("Authorization", auth.to_string()))
        .peer_addr(peer())
}

fn delete(uri: &str, auth: &str) -> TestRequest {
    TestRequest::delete()
        .uri(uri)
        .insert_header(("Authorization", auth.to_string()))
        .peer_addr(peer())
}

#[actix_web::test]
async fn punch_in_out_then_completed() {
    let h = harness().await;
    let app = test_app!(h);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, punch_body(yesterday_at(10, 15), "Web")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "in");
    assert_eq!(body["record"]["status"], "Present");
    assert_eq!(body["record"]["punch_in"]["status"], "Late");

    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, punch_body(yesterday_at(19, 5), "Web")).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "out");
    assert_eq!(body["record"]["punch_out"]["status"], "Normal");

    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, punch_body(yesterday_at(20, 0), "Web")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["record"]["punch_out"]["status"], "Normal");

    let month = yesterday_at(0, 0).format("%Y-%m").to_string();
    let resp = test::call_service(
        &app,
        get(&format!("/api/attendance/records/{EMPLOYEE}?month={month}"), &auth).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["month"], month);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn office_mode_rejects_punches_outside_the_geofence() {
    let h = harness().await;
    let app = test_app!(h);
    let hr = token(ROLE_HR, None);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    let resp = test::call_service(
        &app,
        put(
            &format!("/api/attendance/ledger/{EMPLOYEE}"),
            &hr,
            json!({
                "attendance_mode": {
                    "smartphone": { "enabled": true, "mark_attendance_from": "Office" }
                }
            }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut far = punch_body(yesterday_at(9, 50), "Mobile");
    far["location"] = json!({ "lat": north_of(BRANCH_LAT, 150.0), "lng": BRANCH_LNG });
    let resp = test::call_service(&app, post("/api/attendance/punch", &auth, far).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    let distance = body["distance_meters"].as_f64().unwrap();
    assert!((distance - 150.0).abs() <= 1.0, "distance was {distance}");
    assert!(body["message"].as_str().unwrap().contains("150 meters"));

    let mut near = punch_body(yesterday_at(9, 50), "Mobile");
    near["location"] = json!({ "lat": north_of(BRANCH_LAT, 80.0), "lng": BRANCH_LNG });
    let resp = test::call_service(&app, post("/api/attendance/punch", &auth, near).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "in");

    h.state.ledger.effects().flush().await;
    let resp = test::call_service(
        &app,
        get(&format!("/api/attendance/anomalies/{EMPLOYEE}"), &hr).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let types: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["anomaly_type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["GPS Spoofing"]);
}

#[actix_web::test]
async fn rapid_punch_out_is_flagged_exactly_once() {
    let h = harness().await;
    let app = test_app!(h);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    for at in [yesterday_at(10, 0), yesterday_at(10, 1)] {
        let resp =
            test::call_service(&app, post("/api/attendance/punch", &auth, punch_body(at, "Web")).to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    h.state.ledger.effects().flush().await;
    let anomalies = h.store.anomalies_for(EMPLOYEE).await.unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].anomaly_type.to_string(), "Rapid Punches");
}

#[actix_web::test]
async fn anomaly_store_outage_does_not_fail_the_punch() {
    let h = harness().await;
    let app = test_app!(h);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));
    h.store.reject_anomaly_writes(true);

    for at in [yesterday_at(10, 0), yesterday_at(10, 1)] {
        let resp =
            test::call_service(&app, post("/api/attendance/punch", &auth, punch_body(at, "Web")).to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    h.state.ledger.effects().flush().await;
    h.store.reject_anomaly_writes(false);

    assert!(h.store.anomalies_for(EMPLOYEE).await.unwrap().is_empty());
    let yesterday = yesterday_at(0, 0).date_naive();
    let record = h.store.record(EMPLOYEE, yesterday).await.unwrap().unwrap();
    assert!(record.punch_out.is_some());
}

#[actix_web::test]
async fn employees_only_see_their_own_day() {
    let h = harness().await;
    let app = test_app!(h);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    let resp = test::call_service(&app, get(&format!("/api/attendance/today/{EMPLOYEE}"), &auth).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "none");
    assert!(body["record"].is_null());

    let resp =
        test::call_service(&app, get(&format!("/api/attendance/today/{COLLEAGUE}"), &auth).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri(&format!("/api/attendance/today/{EMPLOYEE}"))
            .peer_addr(peer())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        get(&format!("/api/attendance/today/{EMPLOYEE}"), "Bearer not-a-token").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn malformed_and_future_punches_are_rejected() {
    let h = harness().await;
    let app = test_app!(h);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, json!({ "company_id": "one", "source": "Web" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].is_string());

    let future = Utc::now() + Duration::hours(2);
    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, punch_body(future, "Web")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut unknown = punch_body(yesterday_at(10, 0), "Web");
    unknown["company_id"] = json!(404);
    let resp = test::call_service(&app, post("/api/attendance/punch", &auth, unknown).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        post("/api/attendance/punch", &auth, punch_body(yesterday_at(10, 0), "Kiosk")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn manual_status_survives_the_sweep() {
    let h = harness().await;
    let app = test_app!(h);
    let hr = token(ROLE_HR, None);
    let admin = token(ROLE_ADMIN, None);
    let today = Utc::now().date_naive();

    let uri = format!("/api/attendance/records/{EMPLOYEE}/{today}/status");
    let status = json!({ "status": "Paid Leave", "leave_type_id": 3 });

    let resp = test::call_service(&app, put(&uri, &hr, status.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["record"]["status_source"], "manual");

    let resp = test::call_service(&app, put(&uri, &hr, status).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["changed"], false);

    let resp = test::call_service(&app, post("/api/attendance/sweep", &hr, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, post("/api/attendance/sweep", &admin, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["processed"], 2);
    assert_eq!(report["created"], 1);
    assert_eq!(report["untouched"], 1);

    let kept = h.store.record(EMPLOYEE, today).await.unwrap().unwrap();
    assert_eq!(kept.status.to_string(), "Paid Leave");
    let colleague = h.store.record(COLLEAGUE, today).await.unwrap().unwrap();
    assert_eq!(colleague.status.to_string(), "Absent");

    let resp = test::call_service(&app, post("/api/attendance/sweep", &admin, json!({})).to_request()).await;
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["created"], 0);
    assert_eq!(report["updated"], 0);
}

#[actix_web::test]
async fn admin_corrections_respect_punch_order() {
    let h = harness().await;
    let app = test_app!(h);
    let hr = token(ROLE_HR, None);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));
    let yesterday = yesterday_at(0, 0).date_naive();
    let punch_uri = |which: &str| format!("/api/attendance/records/{EMPLOYEE}/{yesterday}/punch/{which}");

    let resp = test::call_service(
        &app,
        put(&punch_uri("out"), &hr, json!({ "time": yesterday_at(19, 0) })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        put(&punch_uri("in"), &auth, json!({ "time": yesterday_at(9, 0) })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    for (which, at) in [("in", yesterday_at(9, 55)), ("out", yesterday_at(19, 10))] {
        let resp =
            test::call_service(&app, put(&punch_uri(which), &hr, json!({ "time": at })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = test::call_service(&app, delete(&punch_uri("in"), &hr).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, delete(&punch_uri("out"), &hr).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["punch_out"].is_null());

    let resp = test::call_service(&app, delete(&punch_uri("in"), &hr).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "Absent");
}

#[actix_web::test]
async fn new_device_needs_approval() {
    let h = harness().await;
    let app = test_app!(h);
    let hr = token(ROLE_HR, None);
    let auth = token(ROLE_EMPLOYEE, Some(EMPLOYEE));

    let resp = test::call_service(
        &app,
        post("/api/attendance/device/verify", &auth, json!({ "device_id": "device-7" })).to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["device_status"], "trusted");

    let resp = test::call_service(
        &app,
        post("/api/attendance/device/verify", &auth, json!({ "device_id": "new-phone" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["device_status"], "pending");
    let request_id = body["request_id"].as_str().unwrap().to_string();

    let approve = format!("/api/attendance/device/requests/{request_id}/approve");
    let resp = test::call_service(&app, put(&approve, &auth, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, put(&approve, &hr, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "approved");

    let employee = h.store.employee(EMPLOYEE).await.unwrap().unwrap();
    assert_eq!(employee.device_id.as_deref(), Some("new-phone"));
}
