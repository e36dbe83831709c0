use axum::extract::State;

use crate::auth::TokenPair;
use crate::middleware::{ApiResponse, ApiResult, ValidatedJson};
use crate::services::auth_service::{AuthSession, LoginRequest, RefreshRequest, RegisterRequest};
use crate::services::AuthService;
use crate::state::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(state.store).register(request).await?;
    Ok(ApiResponse::created(session))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(state.store).login(request).await?;
    Ok(ApiResponse::success(session))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let tokens = AuthService::new(state.store).refresh(request).await?;
    Ok(ApiResponse::success(tokens))
}
