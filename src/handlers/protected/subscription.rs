use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult, CurrentTenant};
use crate::services::plan_service::SubscriptionUsage;
use crate::services::PlanService;
use crate::state::AppState;

/// GET /api/plans/subscription
pub async fn show(State(state): State<AppState>, CurrentTenant(context): CurrentTenant) -> ApiResult<SubscriptionUsage> {
    let usage = PlanService::new(state.store).subscription_usage(context.tenant_id).await?;
    Ok(ApiResponse::success(usage))
}
