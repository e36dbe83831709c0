//! Request-scoped tenant context.
//!
//! The context lives in a tokio task-local slot. It is visible to every
//! piece of code reachable from the future passed to [`run_with_context`],
//! across `.await` points, and never leaks into concurrently running
//! requests even when they share a worker thread.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::UserRole;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// The tenant and acting user for the current call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub tenant_slug: Option<String>,
    pub user_id: Option<Uuid>,
    pub user_role: Option<UserRole>,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            tenant_slug: None,
            user_id: None,
            user_role: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(slug.into());
        self
    }

    pub fn with_user(mut self, user_id: Uuid, role: UserRole) -> Self {
        self.user_id = Some(user_id);
        self.user_role = Some(role);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Tenant context not found. Ensure the request is authenticated.")]
    Missing,
}

/// Run `fut` with `context` as the ambient tenant context.
///
/// Nested calls shadow the outer context for the duration of the inner
/// future only.
pub async fn run_with_context<F, T>(context: TenantContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_TENANT.scope(context, fut).await
}

pub fn run_with_context_sync<F, T>(context: TenantContext, f: F) -> T
where
    F: FnOnce() -> T,
{
    CURRENT_TENANT.sync_scope(context, f)
}

/// Run `fut` scoped to a tenant with no acting user. Used by background
/// work such as engine callbacks.
pub async fn run_with_tenant<F, T>(tenant_id: Uuid, fut: F) -> T
where
    F: Future<Output = T>,
{
    run_with_context(TenantContext::new(tenant_id), fut).await
}

/// Spawn a task that inherits the caller's context, if any.
///
/// `tokio::spawn` starts tasks with empty task-locals, so the context has to
/// be carried over explicitly.
pub fn spawn_in_context<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current_context() {
        Some(context) => tokio::spawn(CURRENT_TENANT.scope(context, fut)),
        None => tokio::spawn(fut),
    }
}

pub fn current_context() -> Option<TenantContext> {
    CURRENT_TENANT.try_with(|ctx| ctx.clone()).ok()
}

pub fn current_tenant_id() -> Option<Uuid> {
    CURRENT_TENANT.try_with(|ctx| ctx.tenant_id).ok()
}

pub fn has_tenant_context() -> bool {
    current_tenant_id().is_some()
}

pub fn require_tenant_id() -> Result<Uuid, ContextError> {
    current_tenant_id().ok_or(ContextError::Missing)
}

pub fn require_context() -> Result<TenantContext, ContextError> {
    current_context().ok_or(ContextError::Missing)
}
