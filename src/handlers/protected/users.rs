use axum::extract::{Path, State};
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentTenant, ValidatedJson};
use crate::services::user_service::{CreateUserRequest, UpdateUserRequest};
use crate::services::UserService;
use crate::state::AppState;

/// GET /api/users
pub async fn list(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(UserService::new(state.store).list(&context).await?))
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> ApiResult<User> {
    let user = UserService::new(state.store).create(&context, request).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/users/me
pub async fn me(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(state.store).me(&context).await?))
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(state.store).update_me(&context, request).await?))
}

/// GET /api/users/:id
pub async fn show(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(state.store).find_by_id(&context, id).await?))
}

/// PATCH /api/users/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(state.store).update(&context, id, request).await?))
}

/// DELETE /api/users/:id
pub async fn remove(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    Ok(ApiResponse::success(UserService::new(state.store).remove(&context, id).await?))
}
