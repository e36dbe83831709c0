use axum::extract::{Path, State};
use uuid::Uuid;

use crate::database::models::AutomationTemplate;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::automation_service::TemplateSummary;
use crate::services::AutomationService;
use crate::state::AppState;

fn service(state: AppState) -> AutomationService {
    AutomationService::new(state.store, state.engine)
}

/// GET /api/templates
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<TemplateSummary>> {
    Ok(ApiResponse::success(service(state).list_templates().await?))
}

/// GET /api/templates/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<AutomationTemplate> {
    Ok(ApiResponse::success(service(state).find_template(id).await?))
}
