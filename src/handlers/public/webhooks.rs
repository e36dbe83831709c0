use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult, ValidatedJson};
use crate::services::webhook_service::{ExecutionWebhook, WebhookAck};
use crate::services::WebhookService;
use crate::state::AppState;

/// POST /api/webhooks/n8n/execution
///
/// Called by the workflow engine, never by a user, so there is no tenant
/// context on entry; the service derives it from the workflow id.
pub async fn n8n_execution(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ExecutionWebhook>,
) -> ApiResult<WebhookAck> {
    let ack = WebhookService::new(state.store).handle_execution(payload).await?;
    Ok(ApiResponse::success(ack))
}
