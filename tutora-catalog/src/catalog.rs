use crate::plan::PlanSpec;
use std::collections::HashMap;

/// Static name → plan mapping. Purchased item names that resolve here become
/// credit blocks; anything else is reported back to the caller as an unknown
/// item and skipped. Unlimited plans are explicit entries, not a fallback.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<String, PlanSpec>,
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self {
            plans: HashMap::new(),
        }
    }

    /// The production plan table. Session packs carry a dedicated scheduling
    /// page; the 8-pack also grants a returning-customer coupon.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            PlanSpec::sessions("3×30", 3)
                .with_booking_link("https://calendly.com/tutora-sessions/30min-intro"),
        );
        catalog.insert(
            PlanSpec::sessions("5×30", 5)
                .with_booking_link("https://calendly.com/tutora-sessions/30min"),
        );
        catalog.insert(
            PlanSpec::sessions("8×30", 8)
                .with_booking_link("https://calendly.com/tutora-sessions/30min")
                .with_coupon("LOYAL10", 10),
        );
        catalog.insert(PlanSpec::unlimited("Monthly Unlimited"));
        catalog.insert(PlanSpec::unlimited("Homework Help Club"));
        catalog
    }

    pub fn insert(&mut self, spec: PlanSpec) {
        self.plans.insert(Self::key(&spec.display_name), spec);
    }

    /// Case- and whitespace-insensitive lookup by the name the payment
    /// provider reports for the line item.
    pub fn resolve(&self, item_name: &str) -> Option<&PlanSpec> {
        self.plans.get(&Self::key(item_name))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new()
    }
}
