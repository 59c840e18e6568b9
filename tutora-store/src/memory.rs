use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use tutora_core::{Customer, CustomerStore, StoreError, StoreResult, VersionedCustomer};

/// In-memory customer store with the same version-check and coupon
/// uniqueness semantics as the Postgres implementation. Backs the test
/// suites; never used in production wiring.
#[derive(Default)]
pub struct MemoryCustomerStore {
    records: RwLock<HashMap<String, VersionedCustomer>>,
    coupon_codes: RwLock<HashMap<String, String>>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn get(&self, customer_id: &str) -> StoreResult<Option<VersionedCustomer>> {
        Ok(self.records.read().await.get(customer_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<VersionedCustomer>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|v| v.customer.has_contact_email(email))
            .cloned())
    }

    async fn create(&self, mut customer: Customer) -> StoreResult<()> {
        customer.enforce_invariants();
        let mut records = self.records.write().await;
        if records.contains_key(&customer.id) {
            return Err(StoreError::Backend(format!(
                "customer {} already exists",
                customer.id
            )));
        }
        records.insert(
            customer.id.clone(),
            VersionedCustomer {
                customer,
                version: 1,
            },
        );
        Ok(())
    }

    async fn save(&self, mut customer: Customer, expected_version: u64) -> StoreResult<u64> {
        customer.enforce_invariants();
        let mut records = self.records.write().await;
        let Some(existing) = records.get_mut(&customer.id) else {
            return Err(StoreError::VersionConflict(customer.id));
        };
        if existing.version != expected_version {
            return Err(StoreError::VersionConflict(customer.id));
        }
        existing.version += 1;
        existing.customer = customer;
        Ok(existing.version)
    }

    async fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn reserve_coupon_code(&self, code: &str, customer_id: &str) -> StoreResult<()> {
        let mut codes = self.coupon_codes.write().await;
        match codes.get(code) {
            Some(holder) if holder == customer_id => Ok(()),
            Some(_) => Err(StoreError::CouponCodeTaken(code.to_string())),
            None => {
                codes.insert(code.to_string(), customer_id.to_string());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutora_catalog::PlanKind;
    use tutora_core::{BlockStatus, CreditBlock};

    fn customer(id: &str) -> Customer {
        Customer::new(
            id.to_string(),
            "Test Customer".to_string(),
            vec![format!("{}@example.com", id)],
        )
    }

    #[tokio::test]
    async fn test_save_rejects_stale_version() {
        let store = MemoryCustomerStore::new();
        store.create(customer("cust-1")).await.unwrap();

        let first = store.get("cust-1").await.unwrap().unwrap();
        let second = store.get("cust-1").await.unwrap().unwrap();

        store.save(first.customer, first.version).await.unwrap();

        let err = store
            .save(second.customer, second.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn test_save_recomputes_block_status() {
        let store = MemoryCustomerStore::new();
        let mut c = customer("cust-1");
        let mut block = CreditBlock::new(
            "5×30".to_string(),
            String::new(),
            PlanKind::Sessions(5),
        );
        block.remaining_sessions = 0;
        block.status = BlockStatus::Active; // deliberately inconsistent
        c.credit_blocks.push(block);
        store.create(c).await.unwrap();

        let stored = store.get("cust-1").await.unwrap().unwrap();
        assert_eq!(stored.customer.credit_blocks[0].status, BlockStatus::Expired);
    }

    #[tokio::test]
    async fn test_coupon_code_single_holder() {
        let store = MemoryCustomerStore::new();
        store.reserve_coupon_code("LOYAL10", "cust-1").await.unwrap();
        // Re-reserving for the same holder is a replay no-op.
        store.reserve_coupon_code("LOYAL10", "cust-1").await.unwrap();

        let err = store
            .reserve_coupon_code("LOYAL10", "cust-2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CouponCodeTaken(_)));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let store = MemoryCustomerStore::new();
        store.create(customer("cust-1")).await.unwrap();

        let found = store.find_by_email("CUST-1@Example.Com").await.unwrap();
        assert!(found.is_some());
    }
}
