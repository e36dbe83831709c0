use axum::extract::{Path, State};
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::middleware::{ApiResponse, ApiResult, CurrentTenant, ValidatedJson};
use crate::services::tenant_service::{TenantDetails, TenantStats, UpdateTenantRequest};
use crate::services::TenantService;
use crate::state::AppState;

/// GET /api/tenants/me
pub async fn me(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<TenantDetails> {
    let details = TenantService::new(state.store).find_by_id(context.tenant_id).await?;
    Ok(ApiResponse::success(details))
}

/// GET /api/tenants/me/stats
pub async fn stats(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<TenantStats> {
    let stats = TenantService::new(state.store).stats(context.tenant_id).await?;
    Ok(ApiResponse::success(stats))
}

/// PATCH /api/tenants/me
pub async fn update_me(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    ValidatedJson(request): ValidatedJson<UpdateTenantRequest>,
) -> ApiResult<Tenant> {
    let tenant = TenantService::new(state.store).update(context.tenant_id, request).await?;
    Ok(ApiResponse::success(tenant))
}

/// GET /api/tenants/:tenant_id
///
/// The guard has already rejected any id other than the caller's own.
pub async fn show(
    State(state): State<AppState>,
    CurrentTenant(_context): CurrentTenant,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<TenantDetails> {
    let details = TenantService::new(state.store).find_by_id(tenant_id).await?;
    Ok(ApiResponse::success(details))
}
