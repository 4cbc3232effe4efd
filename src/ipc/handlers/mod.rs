pub mod calendar;
pub mod core;
pub mod slots;
pub mod users;
