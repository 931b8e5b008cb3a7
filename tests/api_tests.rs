// HTTP API tests for Tablesetter

use actix_web::{http::header, http::StatusCode, test, web, App};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;

use tablesetter::auth::{Authenticator, Claims};
use tablesetter::core::Matcher;
use tablesetter::models::{GroupPolicy, RosterEntry};
use tablesetter::routes::{configure_routes, AppState};
use tablesetter::services::{InMemoryLedger, MatchingService, StaticRosterProvider};

const SECRET: &str = "api-test-secret";

fn token(sub: &str, role: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn bearer(sub: &str, role: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token(sub, role)))
}

fn roster(count: usize) -> Vec<RosterEntry> {
    (0..count)
        .map(|i| {
            serde_json::from_value(json!({
                "participantId": format!("p{}", i),
                "status": "confirmed",
                "gender": "female",
                "intentOnDaylight": ["friends"],
                "traitVector": [1.0, (i % 4) as f64, 0.5]
            }))
            .unwrap()
        })
        .collect()
}

fn app_state() -> AppState {
    let provider = StaticRosterProvider::new()
        .with_event("evt", roster(10))
        .with_event("tiny", roster(2));
    let matcher = Matcher::with_policy(GroupPolicy::default()).unwrap();
    let service = MatchingService::new(Arc::new(provider), Arc::new(InMemoryLedger::new()), matcher);

    AppState {
        service: Arc::new(service),
        auth: Arc::new(Authenticator::new(SECRET, "admin")),
    }
}

macro_rules! init_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let app = init_app!();
    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_match_requires_admin() {
    let app = init_app!();

    let req = test::TestRequest::post().uri("/api/v1/events/evt/match").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/match")
        .insert_header(bearer("p1", "participant"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_match_then_results_and_my_group() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/match")
        .insert_header(bearer("ops", "admin"))
        .set_json(json!({"triggeredBy": "ops@example.com"}))
        .to_request();
    let committed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(committed["status"], "COMMITTED");
    assert_eq!(committed["triggeredBy"], "ops@example.com");

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/results")
        .insert_header(bearer("p3", "participant"))
        .to_request();
    let results: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(results["matched"], true);
    assert_eq!(results["attempt"]["attemptId"], committed["attemptId"]);

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/my-group")
        .insert_header(bearer("p3", "participant"))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["participantId"], "p3");
    assert!(mine["group"]["memberIds"]
        .as_array()
        .unwrap()
        .contains(&json!("p3")));

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/my-group")
        .insert_header(bearer("stranger", "participant"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["matched"], false);
    assert!(body.get("group").is_none());
}

#[actix_web::test]
async fn test_my_group_before_any_commit() {
    let app = init_app!();

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/my-group")
        .insert_header(bearer("p3", "participant"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["matched"], false);
    assert_eq!(body["participantId"], "p3");
}

#[actix_web::test]
async fn test_commit_records_token_subject() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/match")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let committed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(committed["triggeredBy"], "ops");
}

#[actix_web::test]
async fn test_malformed_commit_body_commits_nothing() {
    let app = init_app!();

    for payload in [r#"{"triggeredBy": 42"#, r#"{"triggeredBy": 42}"#, "not json"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/events/evt/match")
            .insert_header(bearer("ops", "admin"))
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {}", payload);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_json");
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/history")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert!(history["attempts"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_empty_commit_body_uses_token_subject() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/match")
        .insert_header(bearer("ops", "admin"))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("  ")
        .to_request();
    let committed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(committed["triggeredBy"], "ops");
}

#[actix_web::test]
async fn test_preview_and_history() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/preview")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let preview: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(preview["status"], "PREVIEW");

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/results")
        .insert_header(bearer("p1", "participant"))
        .to_request();
    let results: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(results["matched"], false);
    assert!(results.get("attempt").is_none());

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/v1/events/evt/match")
            .insert_header(bearer("ops", "admin"))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/events/evt/history")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    let attempts = history["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["status"], "COMMITTED");
    assert_eq!(attempts[1]["status"], "SUPERSEDED");
}

#[actix_web::test]
async fn test_error_statuses() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/events/missing/match")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/v1/events/tiny/match")
        .insert_header(bearer("ops", "admin"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "insufficient_participants");
    assert_eq!(body["status_code"], 422);

    let req = test::TestRequest::post()
        .uri("/api/v1/events/evt/match")
        .insert_header(bearer("ops", "admin"))
        .set_json(json!({"triggeredBy": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
