//! Business operations behind the HTTP handlers. Services take explicit
//! tenant contexts and return `ApiError`s ready for the response layer.

pub mod auth_service;
pub mod automation_service;
pub mod plan_service;
pub mod tenant_service;
pub mod user_service;
pub mod webhook_service;

pub use auth_service::AuthService;
pub use automation_service::AutomationService;
pub use plan_service::PlanService;
pub use tenant_service::TenantService;
pub use user_service::UserService;
pub use webhook_service::WebhookService;
