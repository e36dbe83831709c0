use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{decode_jwt, Claims, TokenKind};
use crate::database::models::UserRole;
use crate::error::ApiError;
use crate::tenant::TenantContext;

/// Authenticated identity extracted from a valid access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub tenant_slug: Option<String>,
    pub role: UserRole,
}

impl AuthUser {
    /// The tenant context this identity implies, if it belongs to a tenant.
    pub fn tenant_context(&self) -> Option<TenantContext> {
        let tenant_id = self.tenant_id?;
        let mut context = TenantContext::new(tenant_id).with_user(self.user_id, self.role);
        context.tenant_slug = self.tenant_slug.clone();
        Some(context)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            tenant_slug: claims.tenant_slug,
            role: claims.role,
        }
    }
}

/// Why a presented bearer token was rejected. Public routes ignore it; the
/// guard reports it on protected ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthFailure(pub String);

/// Attach the caller's identity to the request.
///
/// Never rejects: a request without credentials continues anonymously and
/// a bad token is recorded as [`AuthFailure`] for the guard to act on.
pub async fn authenticate(mut request: Request, next: Next) -> Response {
    match extract_jwt_from_headers(request.headers()) {
        Ok(None) => {}
        Ok(Some(token)) => match decode_jwt(&token, TokenKind::Access) {
            Ok(claims) => {
                request.extensions_mut().insert(AuthUser::from(claims));
            }
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                request.extensions_mut().insert(AuthFailure(e.to_string()));
            }
        },
        Err(msg) => {
            request.extensions_mut().insert(AuthFailure(msg));
        }
    }

    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token.trim().is_empty() => Err("Empty JWT token".to_string()),
        Some(token) => Ok(Some(token.trim().to_string())),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("User not authenticated"))
    }
}
