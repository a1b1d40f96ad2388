//! Endpoint tests driving the router directly.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use db::DBService;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{AppState, app_router};
use services::services::{config::Config, notification::Notifier};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

async fn test_app() -> (Router, DBService) {
    let db = DBService::new_in_memory().await.unwrap();
    let notifier = Notifier::new(db.pool.clone(), None, None, None);
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_token: ADMIN_TOKEN.to_string(),
        max_assignments_per_lead: 3,
        offer_ttl_minutes: 2880,
        expiry_poll_seconds: 60,
        smtp: None,
        sms: None,
        webhook_url: None,
    };
    let state = AppState {
        db: db.clone(),
        notifier,
        config: Arc::new(config),
    };
    (app_router(state), db)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn admin(mut request: Request<Body>) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-admin-token", ADMIN_TOKEN.parse().unwrap());
    request
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn lead_payload() -> Value {
    json!({
        "category": "plumbing",
        "description": "Remplacement d'un chauffe-eau",
        "city": "Lyon",
        "postal_code": "69003",
        "budget_cents": 80000,
        "client_name": "Marie Martin",
        "client_email": "marie@example.fr",
        "client_phone": null
    })
}

fn artisan_payload(email: &str) -> Value {
    json!({
        "company_name": "Dubois Plomberie",
        "contact_name": "Jean Dubois",
        "email": email,
        "phone": "+33612345678",
        "city": "Lyon",
        "department": "69",
        "skills": ["plumbing"]
    })
}

/// Create a verified artisan through the admin API, returning its id.
async fn create_verified_artisan(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(admin(post_json("/api/admin/artisans", &artisan_payload(email))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(admin(post_json(
            &format!("/api/admin/artisans/{id}/verify"),
            &json!({"verified": true}),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    id
}

#[tokio::test]
async fn test_health() {
    let (app, _db) = test_app().await;
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_create_lead_returns_envelope() {
    let (app, _db) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &lead_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    let reference = body["data"]["reference"].as_str().unwrap();
    assert!(reference.starts_with("DEV-"));
    assert_eq!(body["data"]["department"], json!("69"));

    let id = body["data"]["id"].as_str().unwrap();
    let response = app.oneshot(get(&format!("/api/leads/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_lead_rejects_bad_input() {
    let (app, _db) = test_app().await;

    let mut bad_postal = lead_payload();
    bad_postal["postal_code"] = json!("69");
    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &bad_postal))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));

    let mut bad_email = lead_payload();
    bad_email["client_email"] = json!("not-an-email");
    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &bad_email))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad_category = lead_payload();
    bad_category["category"] = json!("underwater-basket-weaving");
    let response = app
        .oneshot(post_json("/api/leads", &bad_category))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_lead_is_404() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(get(&format!("/api/leads/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (app, _db) = test_app().await;

    let response = app.clone().oneshot(get("/api/admin/leads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut wrong = get("/api/admin/leads");
    wrong
        .headers_mut()
        .insert("x-admin-token", "wrong".parse().unwrap());
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(admin(get("/api/admin/leads"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_directory_search_filters_by_category() {
    let (app, _db) = test_app().await;

    create_verified_artisan(&app, "dubois@ex.fr").await;

    let response = app
        .clone()
        .oneshot(get("/api/artisans?category=plumbing&department=69"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["skills"], json!(["plumbing"]));

    let response = app
        .oneshot(get("/api/artisans?category=roofing&department=69"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_full_lead_to_review_flow() {
    let (app, _db) = test_app().await;

    create_verified_artisan(&app, "dubois@ex.fr").await;

    // Client submits a devis request; dispatch is fire-and-forget.
    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &lead_payload()))
        .await
        .unwrap();
    let lead_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Let the spawned dispatch task run.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Admin redispatch is idempotent: the artisan already holds the offer.
    let response = app
        .clone()
        .oneshot(admin(post_json(
            &format!("/api/admin/leads/{lead_id}/redispatch"),
            &json!({}),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/leads/{lead_id}/assignments")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let assignments = body["data"].as_array().unwrap();
    assert_eq!(assignments.len(), 1);
    let assignment_id = assignments[0]["id"].as_str().unwrap().to_string();

    // The dispatch log recorded the initial pass.
    let response = app
        .clone()
        .oneshot(admin(get(&format!(
            "/api/admin/leads/{lead_id}/dispatch-log"
        ))))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(!body["data"].as_array().unwrap().is_empty());

    // The assignment event recorded one delivery per channel: the in-app
    // send went through, the unconfigured email/SMS channels were skipped.
    let response = app
        .clone()
        .oneshot(admin(get(&format!(
            "/api/admin/events/lead_assigned:{assignment_id}/deliveries"
        ))))
        .await
        .unwrap();
    let body = body_json(response).await;
    let deliveries = body["data"].as_array().unwrap();
    assert_eq!(deliveries.len(), 3);
    let in_app = deliveries
        .iter()
        .find(|d| d["channel"] == json!("in_app"))
        .unwrap();
    assert_eq!(in_app["status"], json!("sent"));
    assert_eq!(
        deliveries
            .iter()
            .filter(|d| d["status"] == json!("skipped"))
            .count(),
        2
    );

    // Artisan accepts the offer.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/assignments/{assignment_id}/respond"),
            &json!({"accept": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Accepting twice conflicts.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/assignments/{assignment_id}/respond"),
            &json!({"accept": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Book the intervention and walk it to completed.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/bookings",
            &json!({
                "assignment_id": assignment_id,
                "scheduled_for": "2026-09-01T09:00:00Z",
                "notes": null
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let booking_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    for status in ["confirmed", "completed"] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/bookings/{booking_id}/status"),
                &json!({"status": status}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Client reviews the completed booking.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/reviews",
            &json!({"booking_id": booking_id, "rating": 5, "comment": "Impeccable"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let review_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // A second review of the same booking conflicts.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/reviews",
            &json!({"booking_id": booking_id, "rating": 1, "comment": null}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Moderation publishes the review and refreshes the artisan's rating.
    let response = app
        .clone()
        .oneshot(admin(post_json(
            &format!("/api/admin/reviews/{review_id}/moderate"),
            &json!({"approve": true}),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/artisans?category=plumbing"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["rating_avg"], json!(5.0));
}

#[tokio::test]
async fn test_booking_requires_accepted_assignment() {
    let (app, _db) = test_app().await;

    create_verified_artisan(&app, "dubois@ex.fr").await;
    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &lead_payload()))
        .await
        .unwrap();
    let lead_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/leads/{lead_id}/assignments")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let assignment_id = body["data"][0]["id"].as_str().unwrap().to_string();

    // Still offered, not accepted: booking refused.
    let response = app
        .oneshot(post_json(
            "/api/bookings",
            &json!({
                "assignment_id": assignment_id,
                "scheduled_for": "2026-09-01T09:00:00Z",
                "notes": null
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_message_thread_and_inbox() {
    let (app, _db) = test_app().await;

    let artisan_id = create_verified_artisan(&app, "dubois@ex.fr").await;
    let response = app
        .clone()
        .oneshot(post_json("/api/leads", &lead_payload()))
        .await
        .unwrap();
    let lead_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/leads/{lead_id}/assignments")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let assignment_id = body["data"][0]["id"].as_str().unwrap().to_string();

    // Client writes; the artisan's in-app inbox receives the notification.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/assignments/{assignment_id}/messages"),
            &json!({"sender": "client", "body": "Bonjour, êtes-vous disponible mardi ?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Empty body rejected.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/assignments/{assignment_id}/messages"),
            &json!({"sender": "client", "body": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/assignments/{assignment_id}/messages")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Let the spawned notification land, then check the artisan inbox.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/notifications?recipient=artisan:{artisan_id}"
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    let inbox = body["data"].as_array().unwrap();
    assert!(
        inbox
            .iter()
            .any(|n| n["title"].as_str().unwrap().contains("Nouveau message"))
    );
}
