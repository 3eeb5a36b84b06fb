pub mod auth;
pub mod availability;
pub mod bookings;
pub mod services;
pub mod users;
