use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use tutora_core::{
    normalize_booking_url, BlockStatus, Booking, BookingProvider, CustomerStore, RecurringBooking,
    StoreError,
};
use tutora_shared::models::events::NotificationPayload;
use tutora_shared::pii::mask_email;

use crate::notify;
use crate::MAX_WRITE_ATTEMPTS;

/// An inbound scheduling-provider event, already signature-verified and
/// parsed into provider-neutral form by the webhook layer.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionBooked {
    pub invitee_email: String,
    /// Calendly event uuid or Zoom meeting id. The idempotency key.
    pub provider_event_id: String,
    pub event_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub provider: BookingProvider,
    /// Booking page the invitee scheduled through, when the provider reports
    /// one. Matched against each block's bound link.
    pub booking_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachPolicy {
    /// When no block matches the event's booking URL, bind the first active
    /// block (or the first block at all) instead of rejecting. Lets a
    /// legitimate session through when the link mapping is stale, at the
    /// risk of attaching to the wrong plan. Every use logs at WARN so the
    /// reassignment is visible.
    pub rebind_fallback: bool,
}

impl Default for AttachPolicy {
    fn default() -> Self {
        Self {
            rebind_fallback: true,
        }
    }
}

#[derive(Debug)]
pub enum AttachOutcome {
    Attached {
        customer_id: String,
        block_name: String,
        /// None for unlimited plans.
        sessions_remaining: Option<u32>,
        notification: NotificationPayload,
    },
    SeriesRecorded {
        customer_id: String,
        meeting_id: String,
        occurrences_added: usize,
        notification: NotificationPayload,
    },
    /// The provider event was seen before. Providers retry on non-2xx and on
    /// timeout, so a replay must stay a success with no side effects.
    AlreadyProcessed,
}

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("no customer holds contact email {0}")]
    CustomerNotFound(String),

    #[error("customer {0} has no credit blocks to book against")]
    NoEntitlement(String),

    #[error("customer {customer_id} has no sessions left on block {block_name}")]
    EntitlementExhausted {
        customer_id: String,
        block_name: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Attaches scheduling-provider events to a customer's entitlements:
/// Calendly events consume a session from a credit block, Zoom registrant
/// events record a weekly class series. Both are idempotent per provider
/// event id.
pub struct BookingAttacher {
    policy: AttachPolicy,
}

impl BookingAttacher {
    pub fn new(policy: AttachPolicy) -> Self {
        Self { policy }
    }

    pub async fn attach(
        &self,
        store: &dyn CustomerStore,
        event: &SessionBooked,
    ) -> Result<AttachOutcome, AttachError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match event.provider {
                BookingProvider::Calendly => self.attach_session(store, event).await,
                BookingProvider::Zoom => self.record_series(store, event).await,
            };
            match result {
                Err(AttachError::Store(StoreError::VersionConflict(id)))
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    warn!(customer = %id, attempt, "booking write conflicted, retrying");
                }
                other => return other,
            }
        }
    }

    async fn attach_session(
        &self,
        store: &dyn CustomerStore,
        event: &SessionBooked,
    ) -> Result<AttachOutcome, AttachError> {
        let versioned = store
            .find_by_email(&event.invitee_email)
            .await?
            .ok_or_else(|| AttachError::CustomerNotFound(mask_email(&event.invitee_email)))?;
        let mut customer = versioned.customer;

        // Idempotency before anything else.
        if customer
            .booking_by_event_id(&event.provider_event_id)
            .is_some()
        {
            info!(customer = %customer.id, event = %event.provider_event_id, "provider event already attached, no-op");
            return Ok(AttachOutcome::AlreadyProcessed);
        }

        if customer.credit_blocks.is_empty() {
            return Err(AttachError::NoEntitlement(customer.id));
        }

        let matched = event
            .booking_url
            .as_deref()
            .map(normalize_booking_url)
            .and_then(|link| customer.block_with_link(&link));

        let idx = match matched {
            Some(idx) => idx,
            None if self.policy.rebind_fallback => {
                let idx = customer
                    .credit_blocks
                    .iter()
                    .position(|b| b.status == BlockStatus::Active)
                    .unwrap_or(0);
                let block = &mut customer.credit_blocks[idx];
                warn!(
                    customer = %customer.id,
                    block = %block.name,
                    url = event.booking_url.as_deref().unwrap_or("<none>"),
                    "no block matched booking URL, rebinding fallback block"
                );
                if let Some(url) = &event.booking_url {
                    block.booking_link = Some(url.clone());
                }
                block.status = BlockStatus::Active;
                idx
            }
            None => return Err(AttachError::NoEntitlement(customer.id)),
        };

        let block = &mut customer.credit_blocks[idx];
        if block.is_exhausted() {
            return Err(AttachError::EntitlementExhausted {
                customer_id: customer.id.clone(),
                block_name: block.name.clone(),
            });
        }
        block.consume_session();
        let block_name = block.name.clone();
        let sessions_remaining = if block.is_unlimited() {
            None
        } else {
            Some(block.remaining_sessions)
        };

        customer.bookings.push(Booking::new(
            event.provider_event_id.clone(),
            event.event_name.clone(),
            event.start_time,
            event.end_time,
            event.timezone.clone(),
        ));

        let notification = notify::booking_notification(
            &event.invitee_email,
            &event.event_name,
            event.start_time,
            &block_name,
            sessions_remaining,
        );

        let customer_id = customer.id.clone();
        store.save(customer, versioned.version).await?;
        info!(
            customer = %customer_id,
            invitee = %mask_email(&event.invitee_email),
            block = %block_name,
            ?sessions_remaining,
            "session attached"
        );

        Ok(AttachOutcome::Attached {
            customer_id,
            block_name,
            sessions_remaining,
            notification,
        })
    }

    async fn record_series(
        &self,
        store: &dyn CustomerStore,
        event: &SessionBooked,
    ) -> Result<AttachOutcome, AttachError> {
        let versioned = store
            .find_by_email(&event.invitee_email)
            .await?
            .ok_or_else(|| AttachError::CustomerNotFound(mask_email(&event.invitee_email)))?;
        let mut customer = versioned.customer;

        let idx = match customer
            .class_series
            .iter()
            .position(|s| s.meeting_id == event.provider_event_id)
        {
            Some(i) => i,
            None => {
                customer.class_series.push(RecurringBooking::new(
                    event.provider_event_id.clone(),
                    event.event_name.clone(),
                    event.timezone.clone(),
                ));
                customer.class_series.len() - 1
            }
        };

        let series = &mut customer.class_series[idx];
        let mut added = 0;
        for at in weekly_occurrences(event.start_time, Utc::now()) {
            if series.add_occurrence(at) {
                added += 1;
            }
        }

        if added == 0 {
            info!(customer = %customer.id, meeting = %event.provider_event_id, "registration already recorded, no-op");
            return Ok(AttachOutcome::AlreadyProcessed);
        }

        let notification = notify::series_notification(
            &event.invitee_email,
            &event.event_name,
            event.start_time,
            added,
        );

        let customer_id = customer.id.clone();
        let meeting_id = event.provider_event_id.clone();
        store.save(customer, versioned.version).await?;
        info!(
            customer = %customer_id,
            meeting = %meeting_id,
            occurrences = added,
            "class registration recorded"
        );

        Ok(AttachOutcome::SeriesRecorded {
            customer_id,
            meeting_id,
            occurrences_added: added,
            notification,
        })
    }
}

/// Expand a registrant's first session date into the weekly slots between
/// "now" and that date, walking backward one week at a time. The provider
/// only reports the first upcoming date; the slots in between are inferred.
/// The first date itself is always kept, even when already past; it ages
/// into the archive on the next sweep.
pub fn weekly_occurrences(first_session: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = vec![first_session];
    let mut cursor = first_session - Duration::weeks(1);
    while cursor >= now {
        out.push(cursor);
        cursor = cursor - Duration::weeks(1);
    }
    out
}
