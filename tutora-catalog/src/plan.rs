use serde::{Deserialize, Serialize};

/// What a purchased plan entitles the customer to. The marketing name on the
/// checkout page is just a display label; business logic branches on this
/// variant, never on the name string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanKind {
    /// A bundle of N bookable sessions, consumed one booking at a time.
    Sessions(u32),
    /// Open-ended access (weekly class registration, no per-session counter).
    Unlimited,
}

impl PlanKind {
    pub fn session_count(&self) -> Option<u32> {
        match self {
            PlanKind::Sessions(n) => Some(*n),
            PlanKind::Unlimited => None,
        }
    }
}

/// A discount coupon granted as a side effect of buying a specific plan.
/// Code and percentage are fixed per plan name; the store enforces that a
/// code is only ever held by one customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CouponGrant {
    pub code: String,
    pub percent_off: u8,
}

/// Catalog entry for one purchasable plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSpec {
    pub display_name: String,
    pub kind: PlanKind,
    /// Scheduling-provider page this plan's sessions are booked through.
    pub booking_link: Option<String>,
    pub coupon: Option<CouponGrant>,
}

impl PlanSpec {
    pub fn sessions(name: &str, count: u32) -> Self {
        Self {
            display_name: name.to_string(),
            kind: PlanKind::Sessions(count),
            booking_link: None,
            coupon: None,
        }
    }

    pub fn unlimited(name: &str) -> Self {
        Self {
            display_name: name.to_string(),
            kind: PlanKind::Unlimited,
            booking_link: None,
            coupon: None,
        }
    }

    pub fn with_booking_link(mut self, link: &str) -> Self {
        self.booking_link = Some(link.to_string());
        self
    }

    pub fn with_coupon(mut self, code: &str, percent_off: u8) -> Self {
        self.coupon = Some(CouponGrant {
            code: code.to_string(),
            percent_off,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_kind_session_count() {
        assert_eq!(PlanKind::Sessions(5).session_count(), Some(5));
        assert_eq!(PlanKind::Unlimited.session_count(), None);
    }

    #[test]
    fn test_plan_kind_round_trips_through_json() {
        let kind: PlanKind =
            serde_json::from_str(&serde_json::to_string(&PlanKind::Sessions(8)).unwrap()).unwrap();
        assert_eq!(kind, PlanKind::Sessions(8));
    }

    #[test]
    fn test_spec_builder() {
        let spec = PlanSpec::sessions("8×30", 8)
            .with_booking_link("https://calendly.com/tutora/30min-pack")
            .with_coupon("LOYAL10", 10);
        assert_eq!(spec.kind, PlanKind::Sessions(8));
        assert!(spec.booking_link.is_some());
        assert_eq!(spec.coupon.unwrap().percent_off, 10);
    }
}
