use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{AutomationExecution, AutomationInstance, ExecutionStatus, Subscription};
use crate::database::{increment, Repository, Store, StoreError};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::tenant::run_with_tenant;

/// Execution notification posted by the workflow engine.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionWebhook {
    #[validate(length(min = 1))]
    pub execution_id: String,
    #[validate(length(min = 1))]
    pub workflow_id: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
}

pub struct WebhookService {
    store: Arc<dyn Store>,
}

impl WebhookService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record an execution update against the automation that owns the
    /// workflow. Unknown workflows are acknowledged but not processed.
    pub async fn handle_execution(&self, payload: ExecutionWebhook) -> Result<WebhookAck, ApiError> {
        info!(execution_id = %payload.execution_id, status = %payload.status, "Engine execution webhook");

        // The caller is the engine, not a tenant user: find the owner first.
        let automation = Repository::<AutomationInstance>::system(self.store.clone())
            .find_first(FilterData::matching(json!({ "workflow_id": payload.workflow_id })))
            .await?;
        let Some(automation) = automation else {
            warn!(workflow_id = %payload.workflow_id, "No automation for workflow");
            return Ok(WebhookAck {
                received: true,
                processed: false,
                execution_id: None,
            });
        };

        let execution = run_with_tenant(automation.tenant_id, self.record(&automation, payload)).await?;
        Ok(WebhookAck {
            received: true,
            processed: true,
            execution_id: Some(execution.id),
        })
    }

    /// Runs inside the owning tenant's context; every repository here is
    /// scoped by it.
    async fn record(&self, automation: &AutomationInstance, payload: ExecutionWebhook) -> Result<AutomationExecution, ApiError> {
        let executions = Repository::<AutomationExecution>::scoped(self.store.clone());
        let status = ExecutionStatus::from_engine(&payload.status);
        let key = json!({ "external_execution_id": payload.execution_id });

        let create = json!({
            "automation_instance_id": automation.id,
            "external_execution_id": payload.execution_id,
            "status": status,
            "input_data": payload.data,
            "started_at": payload.started_at.unwrap_or_else(Utc::now),
        });

        let mut update = Map::new();
        update.insert("status".into(), json!(status));
        if let Some(data) = &payload.data {
            update.insert("output_data".into(), data.clone());
        }
        if let Some(finished_at) = payload.finished_at {
            update.insert("finished_at".into(), json!(finished_at));
        }
        if let Some(error) = &payload.error {
            update.insert("error_message".into(), json!(error));
        }
        if let (Some(started), Some(finished)) = (payload.started_at, payload.finished_at) {
            update.insert("duration_ms".into(), json!((finished - started).num_milliseconds()));
        }
        let update = Value::Object(update);

        // Counters move only for the delivery whose write changes the status.
        // The status check lives in the UPDATE itself, so concurrent
        // redeliveries cannot both win it.
        let transition = json!({ "$and": [key.clone(), { "status": { "$ne": status } }] });
        let mut counted = executions.update_many(transition.clone(), update.clone()).await? > 0;
        if !counted && executions.find_first(FilterData::matching(key.clone())).await?.is_none() {
            counted = match executions.create(create).await {
                Ok(_) => true,
                // Lost the race to create it; fall back to the status check.
                Err(StoreError::Conflict(_)) => executions.update_many(transition, update.clone()).await? > 0,
                Err(other) => return Err(other.into()),
            };
        }
        if !counted {
            executions.update_many(key.clone(), update).await?;
        }

        if counted {
            self.bump_counters(automation.id, status).await?;
        }
        executions
            .find_first(FilterData::matching(key))
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Execution record was not stored"))
    }

    async fn bump_counters(&self, automation_id: Uuid, status: ExecutionStatus) -> Result<(), ApiError> {
        let automations = Repository::<AutomationInstance>::scoped(self.store.clone());
        match status {
            ExecutionStatus::Success => {
                Repository::<Subscription>::scoped(self.store.clone())
                    .update_many(json!({}), json!({ "executions_used": increment(1) }))
                    .await?;
                automations
                    .update(
                        automation_id,
                        json!({ "execution_count": increment(1), "last_executed_at": Utc::now() }),
                    )
                    .await?;
            }
            ExecutionStatus::Error => {
                automations
                    .update(automation_id, json!({ "error_count": increment(1) }))
                    .await?;
            }
            ExecutionStatus::Running => {}
        }
        Ok(())
    }
}
