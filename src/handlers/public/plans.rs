use axum::extract::{Path, State};

use crate::database::models::Plan;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::PlanService;
use crate::state::AppState;

/// GET /api/plans
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Plan>> {
    Ok(ApiResponse::success(PlanService::new(state.store).list_public().await?))
}

/// GET /api/plans/:slug
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Plan> {
    Ok(ApiResponse::success(PlanService::new(state.store).find_by_slug(&slug).await?))
}
