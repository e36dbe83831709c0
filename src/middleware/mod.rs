//! Request pipeline: authenticate, establish tenant context, then guard.
//!
//! The first two run for every request as router layers; the guard is a
//! route layer so it can see the matched route template.

pub mod auth;
pub mod response;
pub mod tenant_context;
pub mod tenant_guard;
pub mod validation;

pub use auth::{authenticate, AuthFailure, AuthUser};
pub use response::{ApiResponse, ApiResult};
pub use tenant_context::{establish_tenant_context, CurrentTenant};
pub use tenant_guard::{authorize, policy_for, tenant_guard, RoutePolicy};
pub use validation::{ValidatedJson, ValidatedQuery};
