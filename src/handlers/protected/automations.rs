use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{AutomationExecution, AutomationInstance};
use crate::middleware::{ApiResponse, ApiResult, CurrentTenant, ValidatedJson, ValidatedQuery};
use crate::services::automation_service::{
    AutomationDetails, CreateAutomationRequest, ExecutionDetails, UpdateAutomationRequest,
};
use crate::services::AutomationService;
use crate::state::AppState;

fn service(state: AppState) -> AutomationService {
    AutomationService::new(state.store, state.engine)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ExecutionsQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i32>,
}

/// Optional body for a manual trigger.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub data: Option<Value>,
}

/// GET /api/automations
pub async fn list(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
) -> ApiResult<Vec<AutomationInstance>> {
    Ok(ApiResponse::success(service(state).list(&context).await?))
}

/// POST /api/automations
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    ValidatedJson(request): ValidatedJson<CreateAutomationRequest>,
) -> ApiResult<AutomationInstance> {
    Ok(ApiResponse::created(service(state).create(&context, request).await?))
}

/// GET /api/automations/:id
pub async fn show(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<AutomationDetails> {
    Ok(ApiResponse::success(service(state).find_by_id(&context, id).await?))
}

/// PATCH /api/automations/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateAutomationRequest>,
) -> ApiResult<AutomationInstance> {
    Ok(ApiResponse::success(service(state).update(&context, id, request).await?))
}

/// DELETE /api/automations/:id
pub async fn remove(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    Ok(ApiResponse::success(service(state).remove(&context, id).await?))
}

/// POST /api/automations/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<AutomationInstance> {
    Ok(ApiResponse::success(service(state).activate(&context, id).await?))
}

/// POST /api/automations/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<AutomationInstance> {
    Ok(ApiResponse::success(service(state).deactivate(&context, id).await?))
}

/// POST /api/automations/:id/trigger
///
/// The body is optional; an empty request triggers with no input data.
pub async fn trigger(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
    body: Option<axum::Json<TriggerRequest>>,
) -> ApiResult<Value> {
    let data = body.and_then(|axum::Json(request)| request.data);
    Ok(ApiResponse::success(service(state).trigger(&context, id, data).await?))
}

/// GET /api/automations/:id/executions?limit=
pub async fn executions(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path(id): Path<Uuid>,
    ValidatedQuery(query): ValidatedQuery<ExecutionsQuery>,
) -> ApiResult<Vec<AutomationExecution>> {
    Ok(ApiResponse::success(service(state).executions(&context, id, query.limit).await?))
}

/// GET /api/automations/:id/executions/:execution_id
pub async fn execution(
    State(state): State<AppState>,
    CurrentTenant(context): CurrentTenant,
    Path((id, execution_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<ExecutionDetails> {
    Ok(ApiResponse::success(service(state).execution(&context, id, execution_id).await?))
}
