use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use tutora_core::CustomerStore;
use tutora_entitlement::ArchivalSweeper;
use tutora_shared::models::events::SweepCompletedEvent;
use tutora_store::EventProducer;

/// Timer collaborator for the archival sweep. The first tick fires right at
/// startup (catches up after a deploy), then once per configured interval.
/// Per-customer failure isolation lives inside the sweeper itself.
pub async fn start_archival_worker(
    store: Arc<dyn CustomerStore>,
    kafka: Arc<EventProducer>,
    interval_hours: u64,
) {
    let sweeper = ArchivalSweeper::new();
    let mut ticker = interval(Duration::from_secs(interval_hours.max(1) * 3600));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_hours, "archival worker started");

    loop {
        ticker.tick().await;

        let report = sweeper.sweep(store.as_ref()).await;

        let _ = kafka
            .publish_json(
                "entitlement.sweep",
                "daily",
                &SweepCompletedEvent {
                    customers_processed: report.customers_processed,
                    entries_archived: report.entries_archived,
                    failures: report.failures,
                    timestamp: Utc::now().timestamp(),
                },
            )
            .await;
    }
}
