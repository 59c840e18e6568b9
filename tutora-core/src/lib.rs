pub mod booking;
pub mod customer;
pub mod repository;

pub use booking::{
    normalize_booking_url, ArchiveSource, ArchivedEntry, Booking, BookingProvider, BookingStatus,
    RecurringBooking,
};
pub use customer::{BlockStatus, Coupon, CreditBlock, Customer};
pub use repository::{CustomerStore, OtpStore, StoreError, StoreResult, VersionedCustomer};
