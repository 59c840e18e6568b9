use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tutora_catalog::PlanCatalog;
use tutora_core::{Coupon, CreditBlock, CustomerStore, StoreError};
use tutora_shared::models::events::NotificationPayload;
use tutora_shared::pii::mask_email;

use crate::notify;
use crate::MAX_WRITE_ATTEMPTS;

/// A confirmed payment. The payment collaborator forwards this only after
/// capture succeeded on its side; nothing here talks to a payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseCapture {
    pub customer_id: String,
    pub contact_email: String,
    pub items: Vec<PurchasedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchasedItem {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// A block with this name already exists on the customer. Catches
    /// webhook replays at the item level; also skips a legitimate re-buy of
    /// the same plan name, which the caller can see here.
    DuplicateName,
    /// The item name is in neither the session-pack table nor the unlimited
    /// table. Non-fatal: the rest of the purchase still credits.
    UnknownItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockGrant {
    pub name: String,
    pub sessions: Option<u32>,
    pub booking_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponIssue {
    pub code: String,
    pub percent_off: u8,
}

#[derive(Debug, Serialize)]
pub struct ReconcileOutcome {
    pub granted: Vec<BlockGrant>,
    pub skipped: Vec<SkippedItem>,
    pub coupons: Vec<CouponIssue>,
    /// Coupon codes that were already reserved by a different customer.
    /// A distinct, visible failure; never a silent duplicate.
    pub coupons_unavailable: Vec<String>,
    /// What the notification dispatcher should tell the customer.
    pub notification: NotificationPayload,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a completed payment into credit blocks, booking links and coupons
/// on the customer record. One persisted write per call.
pub struct PurchaseReconciler {
    catalog: PlanCatalog,
}

impl PurchaseReconciler {
    pub fn new(catalog: PlanCatalog) -> Self {
        Self { catalog }
    }

    pub async fn reconcile(
        &self,
        store: &dyn CustomerStore,
        capture: &PurchaseCapture,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_reconcile(store, capture).await {
                Err(ReconcileError::Store(StoreError::VersionConflict(id)))
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    warn!(customer = %id, attempt, "purchase write conflicted, retrying");
                }
                other => return other,
            }
        }
    }

    async fn try_reconcile(
        &self,
        store: &dyn CustomerStore,
        capture: &PurchaseCapture,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let versioned = store
            .get(&capture.customer_id)
            .await?
            .ok_or_else(|| ReconcileError::CustomerNotFound(capture.customer_id.clone()))?;
        let mut customer = versioned.customer;

        let mut granted = Vec::new();
        let mut skipped = Vec::new();
        let mut coupons = Vec::new();
        let mut coupons_unavailable = Vec::new();

        for item in &capture.items {
            if customer.credit_blocks.iter().any(|b| b.name == item.name) {
                info!(customer = %customer.id, item = %item.name, "item already credited, skipping");
                skipped.push(SkippedItem {
                    name: item.name.clone(),
                    reason: SkipReason::DuplicateName,
                });
                continue;
            }

            let Some(spec) = self.catalog.resolve(&item.name) else {
                warn!(customer = %customer.id, item = %item.name, "purchased item not in plan catalog, skipping");
                skipped.push(SkippedItem {
                    name: item.name.clone(),
                    reason: SkipReason::UnknownItem,
                });
                continue;
            };

            let mut block =
                CreditBlock::new(item.name.clone(), item.description.clone(), spec.kind);
            block.booking_link = spec.booking_link.clone();

            if let Some(grant) = &spec.coupon {
                let already_held = customer.coupons.iter().any(|c| c.code == grant.code);
                if !already_held {
                    match store.reserve_coupon_code(&grant.code, &customer.id).await {
                        Ok(()) => {
                            customer
                                .coupons
                                .push(Coupon::new(grant.code.clone(), grant.percent_off));
                            coupons.push(CouponIssue {
                                code: grant.code.clone(),
                                percent_off: grant.percent_off,
                            });
                        }
                        Err(StoreError::CouponCodeTaken(code)) => {
                            warn!(customer = %customer.id, code = %code, "coupon code already held by another customer");
                            coupons_unavailable.push(code);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }

            granted.push(BlockGrant {
                name: block.name.clone(),
                sessions: block.kind.session_count(),
                booking_link: block.booking_link.clone(),
            });
            customer.credit_blocks.push(block);
        }

        let notification =
            notify::purchase_notification(&capture.contact_email, &granted, &coupons);

        if granted.is_empty() && coupons.is_empty() {
            info!(customer = %customer.id, "purchase produced no new entitlements, nothing to persist");
            return Ok(ReconcileOutcome {
                granted,
                skipped,
                coupons,
                coupons_unavailable,
                notification,
            });
        }

        let customer_id = customer.id.clone();
        store.save(customer, versioned.version).await?;
        info!(
            customer = %customer_id,
            recipient = %mask_email(&capture.contact_email),
            granted = granted.len(),
            skipped = skipped.len(),
            "purchase reconciled"
        );

        Ok(ReconcileOutcome {
            granted,
            skipped,
            coupons,
            coupons_unavailable,
            notification,
        })
    }
}
