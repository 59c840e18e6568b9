use chrono::{DateTime, Utc};
use tracing::{error, info};

use tutora_core::{ArchivedEntry, CustomerStore, StoreError};

use crate::MAX_WRITE_ATTEMPTS;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub customers_processed: usize,
    pub entries_archived: usize,
    pub failures: usize,
}

/// Daily job that moves past-dated session entries into each customer's
/// archive. Archival moves state, it never deletes: every removed entry
/// reappears as exactly one `ArchivedEntry`.
#[derive(Debug, Default)]
pub struct ArchivalSweeper;

impl ArchivalSweeper {
    pub fn new() -> Self {
        Self
    }

    /// Entry point for the timer collaborator.
    pub async fn sweep(&self, store: &dyn CustomerStore) -> SweepReport {
        self.sweep_at(store, Utc::now()).await
    }

    pub async fn sweep_at(&self, store: &dyn CustomerStore, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let ids = match store.list_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "could not list customers for archival sweep");
                report.failures += 1;
                return report;
            }
        };

        for id in ids {
            match self.sweep_customer(store, &id, now).await {
                Ok(archived) => {
                    report.customers_processed += 1;
                    report.entries_archived += archived;
                }
                // One bad record never halts the rest of the sweep.
                Err(e) => {
                    error!(customer = %id, error = %e, "archival failed for customer, continuing");
                    report.failures += 1;
                }
            }
        }

        info!(
            processed = report.customers_processed,
            archived = report.entries_archived,
            failures = report.failures,
            "archival sweep finished"
        );
        report
    }

    async fn sweep_customer(
        &self,
        store: &dyn CustomerStore,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(versioned) = store.get(customer_id).await? else {
                // Record vanished between listing and read.
                return Ok(0);
            };
            let mut customer = versioned.customer;
            let mut archived = Vec::new();

            let mut kept = Vec::with_capacity(customer.bookings.len());
            for booking in customer.bookings.drain(..) {
                if booking.start_time < now {
                    archived.push(ArchivedEntry::from_booking(&booking, now));
                } else {
                    kept.push(booking);
                }
            }
            customer.bookings = kept;

            customer.class_series.retain_mut(|series| {
                for occurred_at in series.split_past(now) {
                    archived.push(ArchivedEntry::from_occurrence(series, occurred_at, now));
                }
                // A series whose last date just aged out is fully archived;
                // one with future dates stays, keeping only those.
                !series.occurrences.is_empty()
            });

            if archived.is_empty() {
                return Ok(0);
            }
            let count = archived.len();
            customer.archived.extend(archived);

            match store.save(customer, versioned.version).await {
                Ok(_) => return Ok(count),
                Err(StoreError::VersionConflict(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    // Interleaved webhook write; re-read and redo the pass.
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
