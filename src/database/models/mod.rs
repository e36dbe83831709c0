pub mod automation;
pub mod execution;
pub mod plan;
pub mod subscription;
pub mod template;
pub mod tenant;
pub mod user;

pub use automation::{AutomationInstance, AutomationStatus};
pub use execution::{AutomationExecution, ExecutionStatus};
pub use plan::Plan;
pub use subscription::{Subscription, SubscriptionStatus};
pub use template::AutomationTemplate;
pub use tenant::Tenant;
pub use user::{User, UserRole, UserStatus};
