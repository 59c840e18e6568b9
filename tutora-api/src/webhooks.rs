use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use tutora_core::BookingProvider;
use tutora_entitlement::notify;
use tutora_entitlement::reconciler::PurchasedItem;
use tutora_entitlement::{AttachError, AttachOutcome, PurchaseCapture, SessionBooked};
use tutora_shared::models::events::{
    BookingAttachedEvent, EntitlementGrantedEvent, NotificationPayload,
};
use tutora_shared::pii::mask_email;

use crate::error::{attach_error, reconcile_error, AppError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/payments", post(handle_payment_webhook))
        .route("/v1/webhooks/scheduling/calendly", post(handle_calendly_webhook))
        .route("/v1/webhooks/scheduling/zoom", post(handle_zoom_webhook))
}

/// What the payment-capture collaborator posts after a charge succeeded.
/// Capture itself happened on its side; this is purely entitlement work.
#[derive(Debug, Deserialize)]
pub struct PaymentCapturedWebhook {
    pub customer_id: String,
    pub contact_email: String,
    pub items: Vec<PurchasedItemPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PurchasedItemPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// POST /v1/webhooks/payments
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentCapturedWebhook>,
) -> Result<Json<Value>, AppError> {
    info!(customer = %payload.customer_id, items = payload.items.len(), "payment capture webhook received");

    let capture = PurchaseCapture {
        customer_id: payload.customer_id,
        contact_email: payload.contact_email,
        items: payload
            .items
            .into_iter()
            .map(|i| PurchasedItem {
                name: i.name,
                description: i.description,
            })
            .collect(),
    };

    let outcome = state
        .reconciler
        .reconcile(state.store.as_ref(), &capture)
        .await
        .map_err(reconcile_error)?;

    if !outcome.granted.is_empty() {
        let event = EntitlementGrantedEvent {
            customer_id: capture.customer_id.clone(),
            plans: outcome.granted.iter().map(|g| g.name.clone()).collect(),
            coupon_codes: outcome.coupons.iter().map(|c| c.code.clone()).collect(),
            timestamp: Utc::now().timestamp(),
        };
        // Fire-and-forget: the entitlement mutation already landed.
        let _ = state
            .kafka
            .publish_json("entitlement.granted", &capture.customer_id, &event)
            .await;
        let _ = state.kafka.publish_notification(&outcome.notification).await;
    }

    Ok(Json(json!({
        "granted": outcome.granted,
        "skipped": outcome.skipped,
        "coupons": outcome.coupons,
        "coupons_unavailable": outcome.coupons_unavailable,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CalendlyWebhook {
    pub event: String,
    pub payload: CalendlyPayload,
}

#[derive(Debug, Deserialize)]
pub struct CalendlyPayload {
    pub email: String,
    pub timezone: String,
    pub scheduled_event: CalendlyScheduledEvent,
}

#[derive(Debug, Deserialize)]
pub struct CalendlyScheduledEvent {
    pub uuid: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// The booking page the invitee scheduled through.
    pub event_type: String,
}

/// POST /v1/webhooks/scheduling/calendly
async fn handle_calendly_webhook(
    State(state): State<AppState>,
    Json(hook): Json<CalendlyWebhook>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if hook.event != "invitee.created" {
        info!(event = %hook.event, "ignoring calendly webhook type");
        return Ok((StatusCode::OK, Json(json!({ "status": "IGNORED" }))));
    }

    let event = SessionBooked {
        invitee_email: hook.payload.email,
        provider_event_id: hook.payload.scheduled_event.uuid,
        event_name: hook.payload.scheduled_event.name,
        start_time: hook.payload.scheduled_event.start_time,
        end_time: hook.payload.scheduled_event.end_time,
        timezone: hook.payload.timezone,
        provider: BookingProvider::Calendly,
        booking_url: Some(hook.payload.scheduled_event.event_type),
    };

    dispatch_booking(&state, event).await
}

#[derive(Debug, Deserialize)]
pub struct ZoomWebhook {
    pub event: String,
    pub payload: ZoomPayload,
}

#[derive(Debug, Deserialize)]
pub struct ZoomPayload {
    pub object: ZoomMeetingObject,
}

#[derive(Debug, Deserialize)]
pub struct ZoomMeetingObject {
    pub id: i64,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    /// Minutes; Zoom omits it for some meeting types.
    #[serde(default = "default_meeting_minutes")]
    pub duration: i64,
    pub timezone: String,
    pub registrant: ZoomRegistrant,
}

fn default_meeting_minutes() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct ZoomRegistrant {
    pub email: String,
}

/// POST /v1/webhooks/scheduling/zoom
async fn handle_zoom_webhook(
    State(state): State<AppState>,
    Json(hook): Json<ZoomWebhook>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if hook.event != "meeting.registration_created" {
        info!(event = %hook.event, "ignoring zoom webhook type");
        return Ok((StatusCode::OK, Json(json!({ "status": "IGNORED" }))));
    }

    let object = hook.payload.object;
    let event = SessionBooked {
        invitee_email: object.registrant.email,
        provider_event_id: object.id.to_string(),
        event_name: object.topic,
        start_time: object.start_time,
        end_time: object.start_time + Duration::minutes(object.duration),
        timezone: object.timezone,
        provider: BookingProvider::Zoom,
        booking_url: None,
    };

    dispatch_booking(&state, event).await
}

async fn dispatch_booking(
    state: &AppState,
    event: SessionBooked,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match state.attacher.attach(state.store.as_ref(), &event).await {
        Ok(AttachOutcome::Attached {
            customer_id,
            block_name,
            sessions_remaining,
            notification,
        }) => {
            let _ = state.kafka.publish_notification(&notification).await;
            let _ = state
                .kafka
                .publish_json(
                    "booking.attached",
                    &customer_id,
                    &BookingAttachedEvent {
                        customer_id: customer_id.clone(),
                        provider_event_id: event.provider_event_id.clone(),
                        block_name: Some(block_name.clone()),
                        sessions_remaining,
                        timestamp: Utc::now().timestamp(),
                    },
                )
                .await;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "ATTACHED",
                    "plan": block_name,
                    "sessions_remaining": sessions_remaining,
                })),
            ))
        }
        Ok(AttachOutcome::SeriesRecorded {
            customer_id,
            meeting_id,
            occurrences_added,
            notification,
        }) => {
            let _ = state.kafka.publish_notification(&notification).await;
            let _ = state
                .kafka
                .publish_json(
                    "booking.attached",
                    &customer_id,
                    &BookingAttachedEvent {
                        customer_id: customer_id.clone(),
                        provider_event_id: meeting_id,
                        block_name: None,
                        sessions_remaining: None,
                        timestamp: Utc::now().timestamp(),
                    },
                )
                .await;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "SERIES_RECORDED",
                    "occurrences_added": occurrences_added,
                })),
            ))
        }
        // A replayed provider event must stay a 2xx or the provider keeps
        // retrying forever.
        Ok(AttachOutcome::AlreadyProcessed) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "ALREADY_PROCESSED" })),
        )),
        Err(err) => {
            if let Some(notification) = attach_failure_notification(state, &event, &err) {
                let _ = state.kafka.publish_notification(&notification).await;
            }
            Err(attach_error(err))
        }
    }
}

/// Exhausted or missing entitlements are surfaced to a human, not silently
/// dropped; the dispatcher decides wording and channel.
fn attach_failure_notification(
    state: &AppState,
    event: &SessionBooked,
    err: &AttachError,
) -> Option<NotificationPayload> {
    match err {
        AttachError::EntitlementExhausted { block_name, .. } => {
            Some(notify::exhaustion_notification(
                &state.business_rules.admin_email,
                &event.invitee_email,
                &event.event_name,
                block_name,
            ))
        }
        AttachError::NoEntitlement(_) => Some(notify::no_entitlement_notification(
            &state.business_rules.admin_email,
            &mask_email(&event.invitee_email),
            &event.event_name,
        )),
        _ => None,
    }
}
