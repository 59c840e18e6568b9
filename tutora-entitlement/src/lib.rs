pub mod attacher;
pub mod notify;
pub mod reconciler;
pub mod sweeper;

pub use attacher::{
    weekly_occurrences, AttachError, AttachOutcome, AttachPolicy, BookingAttacher, SessionBooked,
};
pub use reconciler::{
    PurchaseCapture, PurchaseReconciler, PurchasedItem, ReconcileError, ReconcileOutcome,
};
pub use sweeper::{ArchivalSweeper, SweepReport};

/// Bounded attempts for the optimistic read-modify-write loop before a
/// version conflict is surfaced to the caller.
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 3;
