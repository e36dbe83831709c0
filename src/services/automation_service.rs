use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::PlanService;
use crate::database::models::{AutomationExecution, AutomationInstance, AutomationStatus, AutomationTemplate};
use crate::database::{Repository, Store};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::tenant::TenantContext;
use crate::workflow::{customize_workflow, WorkflowEngine};

const DEFAULT_EXECUTION_PAGE: i32 = 50;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateAutomationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(alias = "templateId")]
    pub template_id: Option<Uuid>,
    pub config: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateAutomationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub status: Option<AutomationStatus>,
    pub config: Option<Map<String, Value>>,
}

/// Catalog entry without the workflow body.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    pub icon: Option<String>,
    pub required_inputs: Value,
}

impl From<AutomationTemplate> for TemplateSummary {
    fn from(template: AutomationTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name,
            slug: template.slug,
            description: template.description,
            category: template.category,
            icon: template.icon,
            required_inputs: template.required_inputs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomationDetails {
    #[serde(flatten)]
    pub automation: AutomationInstance,
    pub template: Option<TemplateSummary>,
    pub executions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDetails {
    #[serde(flatten)]
    pub execution: AutomationExecution,
    /// The engine's view of the run; absent when the engine could not be reached.
    pub remote: Option<Value>,
}

pub struct AutomationService {
    store: Arc<dyn Store>,
    engine: Arc<dyn WorkflowEngine>,
}

impl AutomationService {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { store, engine }
    }

    fn templates(&self) -> Repository<AutomationTemplate> {
        Repository::catalog(self.store.clone())
    }

    fn automations(&self, context: &TenantContext) -> Repository<AutomationInstance> {
        Repository::for_tenant(self.store.clone(), context.tenant_id)
    }

    fn plans(&self) -> PlanService {
        PlanService::new(self.store.clone())
    }

    pub async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ApiError> {
        let filter = FilterData::matching(json!({ "is_active": true, "is_public": true })).order_by("name asc");
        let templates = self.templates().find_many(filter).await?;
        Ok(templates.into_iter().map(TemplateSummary::from).collect())
    }

    pub async fn find_template(&self, id: Uuid) -> Result<AutomationTemplate, ApiError> {
        self.templates()
            .find_unique(id)
            .await?
            .filter(|template| template.is_active)
            .ok_or_else(|| ApiError::not_found("Template not found"))
    }

    pub async fn list(&self, context: &TenantContext) -> Result<Vec<AutomationInstance>, ApiError> {
        let filter = FilterData::default().order_by("created_at desc");
        Ok(self.automations(context).find_many(filter).await?)
    }

    async fn find(&self, context: &TenantContext, id: Uuid) -> Result<AutomationInstance, ApiError> {
        self.automations(context)
            .find_unique(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Automation not found"))
    }

    pub async fn find_by_id(&self, context: &TenantContext, id: Uuid) -> Result<AutomationDetails, ApiError> {
        let automation = self.find(context, id).await?;
        let template = match automation.template_id {
            Some(template_id) => self.templates().find_unique(template_id).await?.map(TemplateSummary::from),
            None => None,
        };
        let executions = Repository::<AutomationExecution>::for_tenant(self.store.clone(), context.tenant_id)
            .count(Some(json!({ "automation_instance_id": id })))
            .await?;

        Ok(AutomationDetails {
            automation,
            template,
            executions,
        })
    }

    pub async fn create(&self, context: &TenantContext, request: CreateAutomationRequest) -> Result<AutomationInstance, ApiError> {
        if self.plans().subscription_for(context.tenant_id).await?.is_none() {
            return Err(ApiError::plan_limit_exceeded("No subscription found"));
        }
        if let Some(template_id) = request.template_id {
            self.find_template(template_id).await?;
        }

        let automation = self
            .automations(context)
            .create(json!({
                "name": request.name.trim(),
                "description": request.description,
                "template_id": request.template_id,
                "config": request.config.unwrap_or_default(),
                "status": AutomationStatus::Inactive.as_str(),
                "execution_count": 0,
                "error_count": 0,
            }))
            .await?;
        info!(tenant_id = %context.tenant_id, automation_id = %automation.id, "Automation created");
        Ok(automation)
    }

    pub async fn update(
        &self,
        context: &TenantContext,
        id: Uuid,
        request: UpdateAutomationRequest,
    ) -> Result<AutomationInstance, ApiError> {
        let automation = self.find(context, id).await?;
        if request.status == Some(AutomationStatus::Active) && automation.status != AutomationStatus::Active {
            self.plans().check_workflow_limit(context.tenant_id, id).await?;
        }

        let mut patch = Map::new();
        if let Some(name) = request.name {
            patch.insert("name".into(), json!(name.trim()));
        }
        if let Some(description) = request.description {
            patch.insert("description".into(), json!(description));
        }
        if let Some(status) = request.status {
            patch.insert("status".into(), json!(status));
        }
        if let Some(config) = request.config {
            patch.insert("config".into(), Value::Object(config));
        }
        if patch.is_empty() {
            return Ok(automation);
        }

        self.automations(context)
            .update(id, Value::Object(patch))
            .await?
            .ok_or_else(|| ApiError::not_found("Automation not found"))
    }

    /// Turn an automation on, creating its engine workflow the first time.
    ///
    /// A tenant already at its plan's active-workflow limit gets a plan-limit
    /// error and the automation keeps its current status.
    pub async fn activate(&self, context: &TenantContext, id: Uuid) -> Result<AutomationInstance, ApiError> {
        let automation = self.find(context, id).await?;
        self.plans().check_workflow_limit(context.tenant_id, id).await?;

        let mut workflow_id = automation.workflow_id.clone();
        if workflow_id.is_none() {
            if let Some(template_id) = automation.template_id {
                let template = self.find_template(template_id).await?;
                let config = automation.config.as_object().cloned().unwrap_or_default();
                let workflow = customize_workflow(&template.workflow_json, &config);
                let name = format!("{} - {}", automation.name, context.tenant_id);

                let remote = self.engine.create_workflow(&name, &workflow).await?;
                self.automations(context)
                    .update(id, json!({ "workflow_id": remote.id, "webhook_url": remote.webhook_url }))
                    .await?;
                info!(automation_id = %id, workflow_id = %remote.id, "Engine workflow created");
                workflow_id = Some(remote.id);
            }
        }

        if let Some(workflow_id) = &workflow_id {
            self.engine.activate_workflow(workflow_id).await?;
        }

        self.set_status(context, id, AutomationStatus::Active).await
    }

    pub async fn deactivate(&self, context: &TenantContext, id: Uuid) -> Result<AutomationInstance, ApiError> {
        let automation = self.find(context, id).await?;
        if let Some(workflow_id) = &automation.workflow_id {
            self.engine.deactivate_workflow(workflow_id).await?;
        }
        self.set_status(context, id, AutomationStatus::Inactive).await
    }

    pub async fn remove(&self, context: &TenantContext, id: Uuid) -> Result<Value, ApiError> {
        let automation = self.find(context, id).await?;
        if let Some(workflow_id) = &automation.workflow_id {
            if let Err(e) = self.engine.delete_workflow(workflow_id).await {
                warn!(workflow_id = %workflow_id, "Ignoring engine delete failure: {}", e);
            }
        }

        if !self.automations(context).delete(id).await? {
            return Err(ApiError::not_found("Automation not found"));
        }
        Ok(json!({ "message": "Automation removed successfully" }))
    }

    /// Run an active automation now, subject to the monthly quota.
    pub async fn trigger(&self, context: &TenantContext, id: Uuid, data: Option<Value>) -> Result<Value, ApiError> {
        let automation = self.find(context, id).await?;
        let workflow_id = automation
            .workflow_id
            .ok_or_else(|| ApiError::bad_request("Automation has no workflow yet; activate it first"))?;
        if automation.status != AutomationStatus::Active {
            return Err(ApiError::bad_request("Automation is not active"));
        }
        self.plans().check_execution_quota(context.tenant_id).await?;

        Ok(self.engine.execute_workflow(&workflow_id, data).await?)
    }

    pub async fn executions(
        &self,
        context: &TenantContext,
        id: Uuid,
        limit: Option<i32>,
    ) -> Result<Vec<AutomationExecution>, ApiError> {
        self.find(context, id).await?;
        let filter = FilterData::matching(json!({ "automation_instance_id": id }))
            .order_by("started_at desc")
            .limit(limit.unwrap_or(DEFAULT_EXECUTION_PAGE));
        Ok(Repository::<AutomationExecution>::for_tenant(self.store.clone(), context.tenant_id)
            .find_many(filter)
            .await?)
    }

    pub async fn execution(
        &self,
        context: &TenantContext,
        id: Uuid,
        execution_id: Uuid,
    ) -> Result<ExecutionDetails, ApiError> {
        let execution = Repository::<AutomationExecution>::for_tenant(self.store.clone(), context.tenant_id)
            .find_first(FilterData::matching(json!({
                "$and": [{ "id": execution_id }, { "automation_instance_id": id }]
            })))
            .await?
            .ok_or_else(|| ApiError::not_found("Execution not found"))?;

        let remote = match self.engine.get_execution(&execution.external_execution_id).await {
            Ok(remote) => Some(remote),
            Err(e) => {
                warn!(execution_id = %execution.external_execution_id, "Engine execution lookup failed: {}", e);
                None
            }
        };
        Ok(ExecutionDetails { execution, remote })
    }

    async fn set_status(
        &self,
        context: &TenantContext,
        id: Uuid,
        status: AutomationStatus,
    ) -> Result<AutomationInstance, ApiError> {
        self.automations(context)
            .update(id, json!({ "status": status }))
            .await?
            .ok_or_else(|| ApiError::not_found("Automation not found"))
    }
}
