pub mod activities;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod profiles;
pub mod reminders;
pub mod state;
pub mod store;
