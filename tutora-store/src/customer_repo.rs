use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use tutora_core::{Customer, CustomerStore, StoreError, StoreResult, VersionedCustomer};

/// Postgres-backed customer store. Each customer is one JSONB document plus
/// a version counter; writes only land when the version the caller read is
/// still current, which closes the lost-update race between concurrent
/// webhooks and the archival sweep.
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_row(row: PgRow) -> StoreResult<VersionedCustomer> {
        let doc: serde_json::Value = row.try_get("doc").map_err(backend)?;
        let version: i64 = row.try_get("version").map_err(backend)?;
        let customer: Customer = serde_json::from_value(doc).map_err(backend)?;
        Ok(VersionedCustomer {
            customer,
            version: version as u64,
        })
    }

    fn emails_for(customer: &Customer) -> Vec<String> {
        customer
            .contact_emails
            .iter()
            .map(|e| e.to_lowercase())
            .collect()
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn get(&self, customer_id: &str) -> StoreResult<Option<VersionedCustomer>> {
        let row = sqlx::query("SELECT doc, version FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Self::decode_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<VersionedCustomer>> {
        let row = sqlx::query("SELECT doc, version FROM customers WHERE $1 = ANY(emails)")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Self::decode_row).transpose()
    }

    async fn create(&self, mut customer: Customer) -> StoreResult<()> {
        customer.enforce_invariants();
        let doc = serde_json::to_value(&customer).map_err(backend)?;

        sqlx::query("INSERT INTO customers (id, emails, doc, version) VALUES ($1, $2, $3, 1)")
            .bind(&customer.id)
            .bind(Self::emails_for(&customer))
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    async fn save(&self, mut customer: Customer, expected_version: u64) -> StoreResult<u64> {
        customer.enforce_invariants();
        let doc = serde_json::to_value(&customer).map_err(backend)?;

        let result = sqlx::query(
            "UPDATE customers SET doc = $1, emails = $2, version = version + 1, updated_at = now() \
             WHERE id = $3 AND version = $4",
        )
        .bind(doc)
        .bind(Self::emails_for(&customer))
        .bind(&customer.id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict(customer.id));
        }

        debug!(customer = %customer.id, version = expected_version + 1, "customer document saved");
        Ok(expected_version + 1)
    }

    async fn list_ids(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM customers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(backend))
            .collect()
    }

    async fn reserve_coupon_code(&self, code: &str, customer_id: &str) -> StoreResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO coupon_codes (code, customer_id) VALUES ($1, $2) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(code)
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if inserted.rows_affected() == 1 {
            return Ok(());
        }

        // Lost the insert: find out who holds the code. The same customer
        // re-reserving (webhook replay) is fine.
        let holder: Option<String> = sqlx::query("SELECT customer_id FROM coupon_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(|r| r.try_get("customer_id"))
            .transpose()
            .map_err(backend)?;

        match holder {
            Some(h) if h == customer_id => Ok(()),
            _ => Err(StoreError::CouponCodeTaken(code.to_string())),
        }
    }
}
