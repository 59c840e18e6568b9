use async_trait::async_trait;

use crate::customer::Customer;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write conflict for customer {0}: stored version moved")]
    VersionConflict(String),

    #[error("coupon code already assigned elsewhere: {0}")]
    CouponCodeTaken(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A customer document together with the version the read observed. The
/// version must be handed back on save so concurrent writers are detected
/// instead of silently overwriting each other.
#[derive(Debug, Clone)]
pub struct VersionedCustomer {
    pub customer: Customer,
    pub version: u64,
}

/// Port to the customer record store: point lookups and whole-document
/// writes, nothing more. Writes are optimistic: `save` fails with
/// `VersionConflict` when the stored version is no longer `expected_version`,
/// and the caller re-reads and retries.
///
/// Implementations must run `Customer::enforce_invariants` on the document
/// before persisting it: status recomputation is a property of every save
/// path, not of individual callers.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get(&self, customer_id: &str) -> StoreResult<Option<VersionedCustomer>>;

    /// Point lookup by contact email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<VersionedCustomer>>;

    async fn create(&self, customer: Customer) -> StoreResult<()>;

    /// Version-checked whole-document write. Returns the new version.
    async fn save(&self, customer: Customer, expected_version: u64) -> StoreResult<u64>;

    async fn list_ids(&self) -> StoreResult<Vec<String>>;

    /// Atomically reserve a coupon code for a customer. Reserving a code the
    /// same customer already holds is a no-op (webhook replay); a code held
    /// by anyone else fails with `CouponCodeTaken`.
    async fn reserve_coupon_code(&self, code: &str, customer_id: &str) -> StoreResult<()>;
}

/// Port for short-lived one-time login codes. Backed by an externally
/// expiring keyed store so codes survive process restarts and multiple
/// instances, never by an in-process map.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn put_code(&self, phone: &str, code: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Fetch-and-delete: a code can be checked exactly once.
    async fn take_code(&self, phone: &str) -> StoreResult<Option<String>>;
}
