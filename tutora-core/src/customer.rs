use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tutora_catalog::PlanKind;

use crate::booking::{ArchivedEntry, Booking, RecurringBooking};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockStatus {
    Active,
    Expired,
    Completed,
}

/// One purchased entitlement: a counted session pack or an unlimited-access
/// plan. Blocks are created by purchase reconciliation, consumed by booking
/// attachment, and expire in place; they are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBlock {
    pub name: String,
    pub description: String,
    pub kind: PlanKind,
    pub total_sessions: u32,
    pub remaining_sessions: u32,
    /// Scheduling-provider URL this block is bound to. Set at most once:
    /// either from the plan catalog at purchase time, or fixed by the first
    /// booking that matches the block.
    pub booking_link: Option<String>,
    pub status: BlockStatus,
    pub purchased_at: DateTime<Utc>,
}

impl CreditBlock {
    pub fn new(name: String, description: String, kind: PlanKind) -> Self {
        let sessions = kind.session_count().unwrap_or(0);
        Self {
            name,
            description,
            kind,
            total_sessions: sessions,
            remaining_sessions: sessions,
            booking_link: None,
            status: BlockStatus::Active,
            purchased_at: Utc::now(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self.kind, PlanKind::Unlimited)
    }

    pub fn is_exhausted(&self) -> bool {
        !self.is_unlimited() && self.remaining_sessions == 0
    }

    /// Consume one session. Returns false when the block has nothing left;
    /// the counter can never pass below zero. Unlimited blocks always accept.
    pub fn consume_session(&mut self) -> bool {
        if self.is_unlimited() {
            return true;
        }
        if self.remaining_sessions == 0 {
            return false;
        }
        self.remaining_sessions -= 1;
        if self.remaining_sessions == 0 {
            self.status = BlockStatus::Expired;
        }
        true
    }

    /// Re-derive status from the counter. `Completed` is an admin-set final
    /// state and is left alone; everything else follows the counter.
    pub fn refresh_status(&mut self) {
        if self.status == BlockStatus::Completed {
            return;
        }
        if self.is_unlimited() {
            self.status = BlockStatus::Active;
            return;
        }
        if self.remaining_sessions > self.total_sessions {
            self.remaining_sessions = self.total_sessions;
        }
        let derived = if self.remaining_sessions == 0 {
            BlockStatus::Expired
        } else {
            BlockStatus::Active
        };
        if self.status != derived {
            tracing::debug!(block = %self.name, ?derived, "credit block status recomputed");
            self.status = derived;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub percent_off: u8,
    pub valid: bool,
    pub assigned_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(code: String, percent_off: u8) -> Self {
        Self {
            code,
            percent_off,
            valid: true,
            assigned_at: Utc::now(),
        }
    }
}

/// The customer aggregate: one document per registered user, read and written
/// as a unit. All entitlement state hangs off this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub display_name: String,
    pub contact_emails: Vec<String>,
    pub phone: Option<String>,
    pub credit_blocks: Vec<CreditBlock>,
    pub bookings: Vec<Booking>,
    pub class_series: Vec<RecurringBooking>,
    pub archived: Vec<ArchivedEntry>,
    pub coupons: Vec<Coupon>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(id: String, display_name: String, contact_emails: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name,
            contact_emails,
            phone: None,
            credit_blocks: Vec::new(),
            bookings: Vec::new(),
            class_series: Vec::new(),
            archived: Vec::new(),
            coupons: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_contact_email(&self, email: &str) -> bool {
        self.contact_emails
            .iter()
            .any(|e| e.eq_ignore_ascii_case(email))
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.contact_emails.first().map(String::as_str)
    }

    pub fn booking_by_event_id(&self, provider_event_id: &str) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.provider_event_id == provider_event_id)
    }

    pub fn booking_by_event_id_mut(&mut self, provider_event_id: &str) -> Option<&mut Booking> {
        self.bookings
            .iter_mut()
            .find(|b| b.provider_event_id == provider_event_id)
    }

    pub fn series_by_meeting_id_mut(&mut self, meeting_id: &str) -> Option<&mut RecurringBooking> {
        self.class_series
            .iter_mut()
            .find(|s| s.meeting_id == meeting_id)
    }

    pub fn block_with_link(&self, normalized_link: &str) -> Option<usize> {
        self.credit_blocks.iter().position(|b| {
            b.booking_link
                .as_deref()
                .map(|l| crate::booking::normalize_booking_url(l) == normalized_link)
                .unwrap_or(false)
        })
    }

    /// Save-time invariant enforcement: every block's status is recomputed
    /// from its counter. Runs inside every store `save`, so reconciliation,
    /// attachment, archival and admin edits all pass through it.
    pub fn enforce_invariants(&mut self) {
        for block in &mut self.credit_blocks {
            block.refresh_status();
        }
        self.updated_at = Utc::now();
    }
}
