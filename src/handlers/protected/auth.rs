use axum::extract::State;
use serde_json::Value;

use crate::middleware::{ApiResponse, ApiResult, CurrentTenant};
use crate::services::AuthService;
use crate::state::AppState;

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<Value> {
    Ok(ApiResponse::success(AuthService::new(state.store).logout(&context).await?))
}
