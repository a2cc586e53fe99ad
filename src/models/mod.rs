pub mod attempt;
pub mod pending_registration;
pub mod quiz;
pub mod room;
pub mod user;
