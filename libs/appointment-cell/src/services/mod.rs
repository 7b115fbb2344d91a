pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notification;
pub mod query;
pub mod time;
pub mod urgency;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use notification::NotificationService;
pub use query::AppointmentQueryService;
pub use urgency::{GeminiUrgencyClassifier, UrgencyClassifier};
