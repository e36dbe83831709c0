//! HTTP handlers in two tiers.
//!
//! `public` routes are reachable without a token (the guard's policy table
//! marks them); `protected` routes run inside the caller's tenant context
//! and pull it with [`CurrentTenant`](crate::middleware::CurrentTenant).

pub mod protected;
pub mod public;
