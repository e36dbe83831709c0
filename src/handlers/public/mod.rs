pub mod auth;
pub mod plans;
pub mod webhooks;
