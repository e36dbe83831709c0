use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::tenant::{require_context, run_with_context, TenantContext};

/// Run the rest of the request inside the caller's tenant context.
///
/// Anonymous requests and identities without a tenant pass through with no
/// context. No authorization happens here.
pub async fn establish_tenant_context(request: Request, next: Next) -> Response {
    let context = request
        .extensions()
        .get::<AuthUser>()
        .and_then(AuthUser::tenant_context);

    match context {
        Some(context) => {
            tracing::trace!(tenant_id = %context.tenant_id, "tenant context established");
            run_with_context(context, next.run(request)).await
        }
        None => next.run(request).await,
    }
}

/// Extractor for the ambient tenant context; 401 when there is none.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentTenant(require_context()?))
    }
}
