use chrono::{DateTime, Utc};
use serde_json::json;

use tutora_shared::models::events::NotificationPayload;

use crate::reconciler::{BlockGrant, CouponIssue};

/// Builders for the structured payloads handed to the notification
/// dispatcher. Wording and channel are the dispatcher's problem; these
/// carry the facts.

pub fn purchase_notification(
    recipient: &str,
    granted: &[BlockGrant],
    coupons: &[CouponIssue],
) -> NotificationPayload {
    NotificationPayload {
        recipients: vec![recipient.to_string()],
        subject: "Your Tutora sessions are ready".to_string(),
        body: json!({
            "kind": "purchase_confirmation",
            "plans": granted,
            "coupons": coupons,
        }),
    }
}

pub fn booking_notification(
    recipient: &str,
    event_name: &str,
    start_time: DateTime<Utc>,
    block_name: &str,
    sessions_remaining: Option<u32>,
) -> NotificationPayload {
    NotificationPayload {
        recipients: vec![recipient.to_string()],
        subject: format!("Session booked: {}", event_name),
        body: json!({
            "kind": "booking_confirmation",
            "event": event_name,
            "starts_at": start_time.to_rfc3339(),
            "plan": block_name,
            "sessions_remaining": sessions_remaining,
        }),
    }
}

pub fn series_notification(
    recipient: &str,
    event_name: &str,
    first_session: DateTime<Utc>,
    occurrences_added: usize,
) -> NotificationPayload {
    NotificationPayload {
        recipients: vec![recipient.to_string()],
        subject: format!("You're registered: {}", event_name),
        body: json!({
            "kind": "class_registration",
            "event": event_name,
            "first_session": first_session.to_rfc3339(),
            "occurrences": occurrences_added,
        }),
    }
}

/// Exhaustion and missing-entitlement conditions must reach a human; the
/// admin inbox gets these alongside the customer.
pub fn exhaustion_notification(
    admin_email: &str,
    invitee_email: &str,
    event_name: &str,
    block_name: &str,
) -> NotificationPayload {
    NotificationPayload {
        recipients: vec![admin_email.to_string(), invitee_email.to_string()],
        subject: "No sessions remaining on plan".to_string(),
        body: json!({
            "kind": "entitlement_exhausted",
            "event": event_name,
            "plan": block_name,
        }),
    }
}

pub fn no_entitlement_notification(
    admin_email: &str,
    invitee_email_masked: &str,
    event_name: &str,
) -> NotificationPayload {
    NotificationPayload {
        recipients: vec![admin_email.to_string()],
        subject: "Booking arrived without a purchased plan".to_string(),
        body: json!({
            "kind": "no_entitlement",
            "event": event_name,
            "invitee": invitee_email_masked,
        }),
    }
}
