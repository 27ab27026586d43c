pub mod appointment;
pub mod availability;
pub mod calendar_token;
pub mod seller;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus, AppointmentView, Counterpart};
pub use availability::{AvailabilitySettings, DayHours, WorkingHours};
pub use calendar_token::CalendarToken;
pub use seller::{OwnerSummary, Seller, SellerListing};
pub use user::{Role, UserProfile};
