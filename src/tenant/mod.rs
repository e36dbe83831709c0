pub mod context;

pub use context::{
    current_context, current_tenant_id, has_tenant_context, require_context, require_tenant_id,
    run_with_context, run_with_context_sync, run_with_tenant, spawn_in_context, ContextError,
    TenantContext,
};
