pub mod analytics;
pub mod auth;
pub mod chat;
pub mod docs;
pub mod export;
pub mod health;
pub mod me;
pub mod public;
pub mod quiz;
pub mod room;
