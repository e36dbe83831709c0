pub mod auth;
pub mod automations;
pub mod subscription;
pub mod templates;
pub mod tenants;
pub mod users;
