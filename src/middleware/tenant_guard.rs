//! Access guard.
//!
//! Every route is governed by a [`RoutePolicy`] looked up from a static
//! table keyed by method and route template. Routes missing from the table
//! require an authenticated identity that belongs to a tenant.

use axum::{
    extract::{MatchedPath, RawPathParams, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::auth::{AuthFailure, AuthUser};
use crate::database::models::UserRole;
use crate::error::ApiError;

/// Names under which a request may name the tenant it targets.
const TENANT_PARAMS: [&str; 2] = ["tenant_id", "tenantId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Skip identity and tenant checks entirely.
    pub skip_tenant_check: bool,
    /// Roles allowed in; empty means any role.
    pub roles: &'static [UserRole],
}

impl RoutePolicy {
    pub const DEFAULT: Self = Self {
        skip_tenant_check: false,
        roles: &[],
    };

    pub const PUBLIC: Self = Self {
        skip_tenant_check: true,
        roles: &[],
    };

    pub const ADMINS: Self = Self {
        skip_tenant_check: false,
        roles: &[UserRole::Owner, UserRole::Admin],
    };
}

const ROUTE_POLICIES: &[(&str, &str, RoutePolicy)] = &[
    ("GET", "/", RoutePolicy::PUBLIC),
    ("GET", "/health", RoutePolicy::PUBLIC),
    ("POST", "/api/auth/register", RoutePolicy::PUBLIC),
    ("POST", "/api/auth/login", RoutePolicy::PUBLIC),
    ("POST", "/api/auth/refresh", RoutePolicy::PUBLIC),
    ("GET", "/api/plans", RoutePolicy::PUBLIC),
    ("GET", "/api/plans/:slug", RoutePolicy::PUBLIC),
    ("POST", "/api/webhooks/n8n/execution", RoutePolicy::PUBLIC),
    ("GET", "/api/users", RoutePolicy::ADMINS),
    ("POST", "/api/users", RoutePolicy::ADMINS),
    ("GET", "/api/users/:id", RoutePolicy::ADMINS),
    ("PATCH", "/api/users/:id", RoutePolicy::ADMINS),
    ("DELETE", "/api/users/:id", RoutePolicy::ADMINS),
];

pub fn policy_for(method: &str, template: &str) -> RoutePolicy {
    ROUTE_POLICIES
        .iter()
        .find(|(m, t, _)| *m == method && *t == template)
        .map(|(_, _, policy)| *policy)
        .unwrap_or(RoutePolicy::DEFAULT)
}

/// Decide whether a request may proceed.
///
/// `path_tenant` and `query_tenant` are the tenant ids the request names
/// explicitly, if any; both must match the identity's tenant.
pub fn authorize(
    policy: &RoutePolicy,
    identity: Option<&AuthUser>,
    failure: Option<&AuthFailure>,
    path_tenant: Option<&str>,
    query_tenant: Option<&str>,
) -> Result<(), ApiError> {
    if policy.skip_tenant_check {
        return Ok(());
    }

    let Some(user) = identity else {
        let message = failure
            .map(|f| f.0.clone())
            .unwrap_or_else(|| "User not authenticated".to_string());
        return Err(ApiError::unauthorized(message));
    };

    let Some(tenant_id) = user.tenant_id else {
        return Err(ApiError::forbidden("User is not associated with any organization"));
    };

    for claimed in [path_tenant, query_tenant].into_iter().flatten() {
        if claimed.is_empty() {
            continue;
        }
        if Uuid::parse_str(claimed).ok() != Some(tenant_id) {
            tracing::warn!(
                user_id = %user.user_id,
                tenant_id = %tenant_id,
                requested = claimed,
                "cross-tenant access denied"
            );
            return Err(ApiError::forbidden("You do not have access to this organization"));
        }
    }

    if !policy.roles.is_empty() && user.role != UserRole::Owner && !policy.roles.contains(&user.role) {
        return Err(ApiError::forbidden("Insufficient permissions for this operation"));
    }

    Ok(())
}

/// Route layer applying [`authorize`] before the handler runs.
pub async fn tenant_guard(
    matched_path: Option<MatchedPath>,
    path_params: Option<RawPathParams>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let policy = match &matched_path {
        Some(path) => policy_for(request.method().as_str(), path.as_str()),
        None => RoutePolicy::DEFAULT,
    };

    let path_tenant = path_params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| TENANT_PARAMS.contains(key))
            .map(|(_, value)| value.to_string())
    });
    let query_tenant = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| TENANT_PARAMS.iter().any(|name| key == name))
            .map(|(_, value)| value.into_owned())
    });

    authorize(
        &policy,
        request.extensions().get::<AuthUser>(),
        request.extensions().get::<AuthFailure>(),
        path_tenant.as_deref(),
        query_tenant.as_deref(),
    )?;

    Ok(next.run(request).await)
}
