use serde::{Deserialize, Serialize};

/// Structured message for the external notification dispatcher. The core
/// never formats or sends email/SMS; it hands this payload to the dispatcher
/// over the `notifications.dispatch` topic and moves on.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationPayload {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntitlementGrantedEvent {
    pub customer_id: String,
    pub plans: Vec<String>,
    pub coupon_codes: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingAttachedEvent {
    pub customer_id: String,
    pub provider_event_id: String,
    pub block_name: Option<String>,
    pub sessions_remaining: Option<u32>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SweepCompletedEvent {
    pub customers_processed: usize,
    pub entries_archived: usize,
    pub failures: usize,
    pub timestamp: i64,
}
