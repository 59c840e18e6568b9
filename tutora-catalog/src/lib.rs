pub mod catalog;
pub mod plan;

pub use catalog::PlanCatalog;
pub use plan::{CouponGrant, PlanKind, PlanSpec};
