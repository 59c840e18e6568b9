use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Booked,
    Completed,
    Cancelled,
    Rescheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingProvider {
    Calendly,
    Zoom,
}

impl BookingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingProvider::Calendly => "calendly",
            BookingProvider::Zoom => "zoom",
        }
    }
}

/// One scheduled session tied to a scheduling-provider event. The provider
/// event id is the idempotency key: it is unique within a customer, so a
/// replayed webhook can never create a second booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub provider_event_id: String,
    pub event_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: BookingStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        provider_event_id: String,
        event_name: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        timezone: String,
    ) -> Self {
        Self {
            provider_event_id,
            event_name,
            start_time,
            end_time,
            timezone,
            status: BookingStatus::Booked,
            note: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// A weekly class registration (Zoom). One registrant event expands into a
/// series of dated occurrences under a single parent keyed by the provider's
/// meeting id; occurrences are archived individually as their dates pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringBooking {
    pub meeting_id: String,
    pub event_name: String,
    pub timezone: String,
    pub occurrences: Vec<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl RecurringBooking {
    pub fn new(meeting_id: String, event_name: String, timezone: String) -> Self {
        Self {
            meeting_id,
            event_name,
            timezone,
            occurrences: Vec::new(),
            registered_at: Utc::now(),
        }
    }

    /// Insert a dated occurrence, guarding duplicates by comparing epoch
    /// timestamps (sub-second noise from the provider is ignored). Returns
    /// false when the date was already present.
    pub fn add_occurrence(&mut self, at: DateTime<Utc>) -> bool {
        if self
            .occurrences
            .iter()
            .any(|o| o.timestamp() == at.timestamp())
        {
            return false;
        }
        self.occurrences.push(at);
        self.occurrences.sort();
        true
    }

    /// Remove and return every occurrence strictly before `now`.
    pub fn split_past(&mut self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let (past, future): (Vec<_>, Vec<_>) =
            self.occurrences.drain(..).partition(|o| *o < now);
        self.occurrences = future;
        past
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSource {
    Calendly,
    Zoom,
}

/// Historical record of a session removed from active view. Append-only:
/// archival moves state here, it never deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedEntry {
    pub id: Uuid,
    pub source_name: String,
    pub description: String,
    pub original_date: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
    pub source: ArchiveSource,
}

impl ArchivedEntry {
    pub fn from_booking(booking: &Booking, archived_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: booking.event_name.clone(),
            description: format!("{:?} session, {}", booking.status, booking.timezone),
            original_date: booking.start_time,
            archived_at,
            source: ArchiveSource::Calendly,
        }
    }

    pub fn from_occurrence(
        series: &RecurringBooking,
        occurred_at: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: series.event_name.clone(),
            description: format!("weekly class, meeting {}", series.meeting_id),
            original_date: occurred_at,
            archived_at,
            source: ArchiveSource::Zoom,
        }
    }
}

/// Canonical form of a scheduling-provider URL for matching against a credit
/// block's bound link: scheme/host/path only, lower-cased, no trailing slash.
pub fn normalize_booking_url(raw: &str) -> String {
    let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
    without_query.trim().trim_end_matches('/').to_lowercase()
}
