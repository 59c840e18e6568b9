use chrono::{Duration, Utc};

use tutora_catalog::PlanCatalog;
use tutora_core::{ArchiveSource, BlockStatus, BookingProvider, Customer, CustomerStore};
use tutora_entitlement::{
    ArchivalSweeper, AttachError, AttachOutcome, AttachPolicy, BookingAttacher, PurchaseCapture,
    PurchaseReconciler, PurchasedItem, SessionBooked,
};
use tutora_store::MemoryCustomerStore;

const EMAIL: &str = "parent@example.com";

async fn store_with_customer() -> MemoryCustomerStore {
    let store = MemoryCustomerStore::new();
    store
        .create(Customer::new(
            "cust-1".to_string(),
            "Jamie R".to_string(),
            vec![EMAIL.to_string()],
        ))
        .await
        .unwrap();
    store
}

fn purchase(items: &[&str]) -> PurchaseCapture {
    PurchaseCapture {
        customer_id: "cust-1".to_string(),
        contact_email: EMAIL.to_string(),
        items: items
            .iter()
            .map(|n| PurchasedItem {
                name: n.to_string(),
                description: String::new(),
            })
            .collect(),
    }
}

fn calendly_event(event_id: &str, booking_url: &str) -> SessionBooked {
    let start = Utc::now() + Duration::days(3);
    SessionBooked {
        invitee_email: EMAIL.to_string(),
        provider_event_id: event_id.to_string(),
        event_name: "30 Minute Session".to_string(),
        start_time: start,
        end_time: start + Duration::minutes(30),
        timezone: "America/New_York".to_string(),
        provider: BookingProvider::Calendly,
        booking_url: Some(booking_url.to_string()),
    }
}

fn zoom_event(meeting_id: &str, weeks_out: i64) -> SessionBooked {
    let start = Utc::now() + Duration::weeks(weeks_out) + Duration::hours(1);
    SessionBooked {
        invitee_email: EMAIL.to_string(),
        provider_event_id: meeting_id.to_string(),
        event_name: "Algebra Club".to_string(),
        start_time: start,
        end_time: start + Duration::minutes(60),
        timezone: "America/New_York".to_string(),
        provider: BookingProvider::Zoom,
        booking_url: None,
    }
}

/// Purchase "5×30", book five sessions through the assigned link, then watch
/// the sixth attempt bounce off the expired block.
#[tokio::test]
async fn test_purchase_to_exhaustion_scenario() {
    let store = store_with_customer().await;
    let reconciler = PurchaseReconciler::new(PlanCatalog::standard());
    let attacher = BookingAttacher::new(AttachPolicy::default());

    let outcome = reconciler
        .reconcile(&store, &purchase(&["5×30"]))
        .await
        .unwrap();
    assert_eq!(outcome.granted.len(), 1);
    assert_eq!(outcome.granted[0].sessions, Some(5));

    let stored = store.get("cust-1").await.unwrap().unwrap();
    let block = &stored.customer.credit_blocks[0];
    assert_eq!(block.total_sessions, 5);
    assert_eq!(block.remaining_sessions, 5);
    assert_eq!(block.status, BlockStatus::Active);
    let link = block.booking_link.clone().unwrap();

    // Booking URL as the provider reports it, query string and all.
    let url = format!("{}?month=2026-09", link);
    for i in 0..5 {
        let result = attacher
            .attach(&store, &calendly_event(&format!("CAL-EVT-{:03}", i), &url))
            .await
            .unwrap();
        match result {
            AttachOutcome::Attached {
                sessions_remaining, ..
            } => assert_eq!(sessions_remaining, Some(4 - i as u32)),
            other => panic!("expected attachment, got {:?}", other),
        }
    }

    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.credit_blocks[0].remaining_sessions, 0);
    assert_eq!(stored.customer.credit_blocks[0].status, BlockStatus::Expired);
    assert_eq!(stored.customer.bookings.len(), 5);

    let err = attacher
        .attach(&store, &calendly_event("CAL-EVT-999", &url))
        .await
        .unwrap_err();
    assert!(matches!(err, AttachError::EntitlementExhausted { .. }));

    // The counter never went below zero and the failed attempt left nothing.
    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.credit_blocks[0].remaining_sessions, 0);
    assert_eq!(stored.customer.bookings.len(), 5);
}

/// Replayed webhook with the same provider event id: one booking, one
/// decrement, second delivery a success no-op.
#[tokio::test]
async fn test_duplicate_provider_event_is_noop() {
    let store = store_with_customer().await;
    let reconciler = PurchaseReconciler::new(PlanCatalog::standard());
    let attacher = BookingAttacher::new(AttachPolicy::default());

    reconciler
        .reconcile(&store, &purchase(&["5×30"]))
        .await
        .unwrap();
    let url = "https://calendly.com/tutora-sessions/30min";

    let first = attacher
        .attach(&store, &calendly_event("CAL-EVT-001", url))
        .await
        .unwrap();
    assert!(matches!(first, AttachOutcome::Attached { .. }));

    let second = attacher
        .attach(&store, &calendly_event("CAL-EVT-001", url))
        .await
        .unwrap();
    assert!(matches!(second, AttachOutcome::AlreadyProcessed));

    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.bookings.len(), 1);
    assert_eq!(stored.customer.credit_blocks[0].remaining_sessions, 4);
}

/// A booking for a customer with no purchases at all is rejected outright.
#[tokio::test]
async fn test_no_entitlement_rejection() {
    let store = store_with_customer().await;
    let attacher = BookingAttacher::new(AttachPolicy::default());

    let err = attacher
        .attach(
            &store,
            &calendly_event("CAL-EVT-001", "https://calendly.com/tutora-sessions/30min"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AttachError::NoEntitlement(_)));
}

/// Stale link mapping: with the fallback enabled the first available block
/// is rebound and consumed; with it disabled the booking is rejected.
#[tokio::test]
async fn test_rebind_fallback_policy_toggle() {
    let store = store_with_customer().await;
    let reconciler = PurchaseReconciler::new(PlanCatalog::standard());
    reconciler
        .reconcile(&store, &purchase(&["3×30"]))
        .await
        .unwrap();

    let stale_url = "https://calendly.com/tutora-sessions/legacy-page";

    let strict = BookingAttacher::new(AttachPolicy {
        rebind_fallback: false,
    });
    let err = strict
        .attach(&store, &calendly_event("CAL-EVT-001", stale_url))
        .await
        .unwrap_err();
    assert!(matches!(err, AttachError::NoEntitlement(_)));

    let permissive = BookingAttacher::new(AttachPolicy {
        rebind_fallback: true,
    });
    let outcome = permissive
        .attach(&store, &calendly_event("CAL-EVT-001", stale_url))
        .await
        .unwrap();
    assert!(matches!(outcome, AttachOutcome::Attached { .. }));

    // The block is now bound to the URL that actually got used.
    let stored = store.get("cust-1").await.unwrap().unwrap();
    let block = &stored.customer.credit_blocks[0];
    assert_eq!(block.booking_link.as_deref(), Some(stale_url));
    assert_eq!(block.remaining_sessions, 2);
}

/// Zoom registration expands into weekly occurrences and merges
/// idempotently under the meeting id.
#[tokio::test]
async fn test_zoom_registration_backfills_weekly_series() {
    let store = store_with_customer().await;
    let reconciler = PurchaseReconciler::new(PlanCatalog::standard());
    reconciler
        .reconcile(&store, &purchase(&["Monthly Unlimited"]))
        .await
        .unwrap();

    let attacher = BookingAttacher::new(AttachPolicy::default());
    let event = zoom_event("83720112345", 2);

    let outcome = attacher.attach(&store, &event).await.unwrap();
    match outcome {
        AttachOutcome::SeriesRecorded {
            occurrences_added, ..
        } => assert_eq!(occurrences_added, 3), // first date + two backfilled weeks
        other => panic!("expected series recording, got {:?}", other),
    }

    // Unlimited plan: nothing was decremented.
    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.credit_blocks[0].status, BlockStatus::Active);
    assert_eq!(stored.customer.class_series.len(), 1);
    assert_eq!(stored.customer.class_series[0].occurrences.len(), 3);

    // Replay of the same registrant event inserts nothing.
    let replay = attacher.attach(&store, &event).await.unwrap();
    assert!(matches!(replay, AttachOutcome::AlreadyProcessed));
    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.class_series[0].occurrences.len(), 3);
}

/// Archival is move-not-copy: past entries land in the archive exactly once,
/// future entries stay active, and a parent with future dates survives.
#[tokio::test]
async fn test_sweep_moves_past_entries_only() {
    let store = store_with_customer().await;
    let now = Utc::now();

    let versioned = store.get("cust-1").await.unwrap().unwrap();
    let mut customer = versioned.customer;

    let mut past_booking = tutora_core::Booking::new(
        "CAL-EVT-OLD".to_string(),
        "30 Minute Session".to_string(),
        now - Duration::days(2),
        now - Duration::days(2) + Duration::minutes(30),
        "America/New_York".to_string(),
    );
    past_booking.note = "went well".to_string();
    customer.bookings.push(past_booking);
    customer.bookings.push(tutora_core::Booking::new(
        "CAL-EVT-NEW".to_string(),
        "30 Minute Session".to_string(),
        now + Duration::days(2),
        now + Duration::days(2) + Duration::minutes(30),
        "America/New_York".to_string(),
    ));

    let mut series = tutora_core::RecurringBooking::new(
        "83720112345".to_string(),
        "Algebra Club".to_string(),
        "America/New_York".to_string(),
    );
    series.add_occurrence(now - Duration::weeks(1));
    series.add_occurrence(now + Duration::weeks(1));
    customer.class_series.push(series);

    store.save(customer, versioned.version).await.unwrap();

    let sweeper = ArchivalSweeper::new();
    let report = sweeper.sweep_at(&store, now).await;
    assert_eq!(report.customers_processed, 1);
    assert_eq!(report.entries_archived, 2);
    assert_eq!(report.failures, 0);

    let stored = store.get("cust-1").await.unwrap().unwrap();
    let customer = stored.customer;

    assert_eq!(customer.bookings.len(), 1);
    assert_eq!(customer.bookings[0].provider_event_id, "CAL-EVT-NEW");

    assert_eq!(customer.class_series.len(), 1);
    assert_eq!(customer.class_series[0].occurrences.len(), 1);
    assert!(customer.class_series[0].occurrences[0] > now);

    assert_eq!(customer.archived.len(), 2);
    let calendly_archives: Vec<_> = customer
        .archived
        .iter()
        .filter(|a| a.source == ArchiveSource::Calendly)
        .collect();
    let zoom_archives: Vec<_> = customer
        .archived
        .iter()
        .filter(|a| a.source == ArchiveSource::Zoom)
        .collect();
    assert_eq!(calendly_archives.len(), 1);
    assert_eq!(zoom_archives.len(), 1);

    // A second pass finds nothing left to move.
    let report = sweeper.sweep_at(&store, now).await;
    assert_eq!(report.entries_archived, 0);
    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert_eq!(stored.customer.archived.len(), 2);
}

/// A series whose last remaining date ages out is removed entirely.
#[tokio::test]
async fn test_sweep_removes_fully_archived_series() {
    let store = store_with_customer().await;
    let now = Utc::now();

    let versioned = store.get("cust-1").await.unwrap().unwrap();
    let mut customer = versioned.customer;
    let mut series = tutora_core::RecurringBooking::new(
        "83720199999".to_string(),
        "Geometry Club".to_string(),
        "America/New_York".to_string(),
    );
    series.add_occurrence(now - Duration::weeks(2));
    series.add_occurrence(now - Duration::weeks(1));
    customer.class_series.push(series);
    store.save(customer, versioned.version).await.unwrap();

    let report = ArchivalSweeper::new().sweep_at(&store, now).await;
    assert_eq!(report.entries_archived, 2);

    let stored = store.get("cust-1").await.unwrap().unwrap();
    assert!(stored.customer.class_series.is_empty());
    assert_eq!(stored.customer.archived.len(), 2);
}

/// The sweep walks every customer; records with nothing to archive are
/// untouched and don't inflate the archive count.
#[tokio::test]
async fn test_sweep_covers_all_customers() {
    let store = store_with_customer().await;
    store
        .create(Customer::new(
            "cust-2".to_string(),
            "Morgan L".to_string(),
            vec!["other@example.com".to_string()],
        ))
        .await
        .unwrap();
    let now = Utc::now();

    let versioned = store.get("cust-1").await.unwrap().unwrap();
    let mut customer = versioned.customer;
    customer.bookings.push(tutora_core::Booking::new(
        "CAL-EVT-OLD".to_string(),
        "30 Minute Session".to_string(),
        now - Duration::days(1),
        now - Duration::days(1) + Duration::minutes(30),
        "America/New_York".to_string(),
    ));
    store.save(customer, versioned.version).await.unwrap();

    let report = ArchivalSweeper::new().sweep_at(&store, now).await;
    assert_eq!(report.customers_processed, 2);
    assert_eq!(report.entries_archived, 1);
    assert_eq!(report.failures, 0);

    let untouched = store.get("cust-2").await.unwrap().unwrap();
    assert!(untouched.customer.archived.is_empty());
}
