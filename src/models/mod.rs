pub mod booking;
pub mod movie;
pub mod newsletter;
pub mod rating;
pub mod showtime;
pub mod stats;
pub mod user;

pub use booking::{Booking, BookingStatus, NewBooking, SeatRequest, Tickets};
pub use movie::Movie;
pub use rating::MovieRating;
pub use showtime::Showtime;
pub use user::User;
