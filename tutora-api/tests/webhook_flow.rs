use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use tutora_api::middleware::auth::AdminClaims;
use tutora_api::state::{AppState, AuthConfig};
use tutora_api::app;
use tutora_catalog::PlanCatalog;
use tutora_core::{CustomerStore, OtpStore};
use tutora_entitlement::{AttachPolicy, BookingAttacher, PurchaseReconciler};
use tutora_store::app_config::BusinessRules;
use tutora_store::{EventProducer, MemoryCustomerStore, RedisClient};

const SECRET: &str = "test-secret";

/// App wired to the in-memory store. Redis and Kafka point at nothing: the
/// rate limiter fails open and event publishes fail fire-and-forget, which
/// is exactly the degradation the handlers promise.
async fn test_app() -> axum::Router {
    let store: Arc<dyn CustomerStore> = Arc::new(MemoryCustomerStore::new());
    let redis = Arc::new(RedisClient::new("redis://127.0.0.1:1").await.unwrap());
    let otp: Arc<dyn OtpStore> = redis.clone();
    let kafka = Arc::new(EventProducer::new("127.0.0.1:1").unwrap());

    let state = AppState {
        store,
        otp,
        redis,
        kafka,
        reconciler: Arc::new(PurchaseReconciler::new(PlanCatalog::standard())),
        attacher: Arc::new(BookingAttacher::new(AttachPolicy::default())),
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        business_rules: BusinessRules {
            rebind_fallback: true,
            sweep_interval_hours: 24,
            otp_ttl_seconds: 300,
            admin_email: "ops@tutora.example".to_string(),
        },
    };

    app(state)
}

fn admin_token() -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        role: "ADMIN".to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_purchase_then_booking_over_http() {
    let app = test_app().await;
    let token = admin_token();

    // Seed the customer through the admin surface.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/admin/customers",
            Some(&token),
            Some(json!({
                "id": "cust-1",
                "display_name": "Jamie R",
                "contact_emails": ["parent@example.com"]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Payment capture webhook grants the 5-pack.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/webhooks/payments",
            None,
            Some(json!({
                "customer_id": "cust-1",
                "contact_email": "parent@example.com",
                "items": [
                    { "name": "5×30", "description": "Five half-hour sessions" },
                    { "name": "Mystery Plan" }
                ]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["granted"].as_array().unwrap().len(), 1);
    assert_eq!(body["skipped"][0]["reason"], "UNKNOWN_ITEM");

    // Calendly booking consumes one session.
    let calendly = json!({
        "event": "invitee.created",
        "payload": {
            "email": "parent@example.com",
            "timezone": "America/New_York",
            "scheduled_event": {
                "uuid": "CAL-EVT-001",
                "name": "30 Minute Session",
                "start_time": "2026-09-01T15:00:00Z",
                "end_time": "2026-09-01T15:30:00Z",
                "event_type": "https://calendly.com/tutora-sessions/30min?month=2026-09"
            }
        }
    });
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/webhooks/scheduling/calendly",
            None,
            Some(calendly.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ATTACHED");
    assert_eq!(body["sessions_remaining"], 4);

    // The provider retries: same event id must be a 200 no-op.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/webhooks/scheduling/calendly",
            None,
            Some(calendly),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ALREADY_PROCESSED");

    // Admin view reflects exactly one booking and four remaining sessions.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/v1/admin/customers/cust-1/entitlements",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(body["credit_blocks"][0]["remaining_sessions"], 4);
}

#[tokio::test]
async fn test_booking_without_customer_is_404() {
    let app = test_app().await;

    let calendly = json!({
        "event": "invitee.created",
        "payload": {
            "email": "stranger@example.com",
            "timezone": "America/New_York",
            "scheduled_event": {
                "uuid": "CAL-EVT-404",
                "name": "30 Minute Session",
                "start_time": "2026-09-01T15:00:00Z",
                "end_time": "2026-09-01T15:30:00Z",
                "event_type": "https://calendly.com/tutora-sessions/30min"
            }
        }
    });
    let response = app
        .oneshot(request(
            "POST",
            "/v1/webhooks/scheduling/calendly",
            None,
            Some(calendly),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/v1/admin/customers/cust-1/entitlements",
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A customer-role token is not enough for the back office.
    let claims = AdminClaims {
        sub: "cust-1".to_string(),
        role: "CUSTOMER".to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let response = app
        .oneshot(request(
            "GET",
            "/v1/admin/customers/cust-1/entitlements",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_route() {
    let app = test_app().await;
    let response = app
        .oneshot(request("GET", "/healthz", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
