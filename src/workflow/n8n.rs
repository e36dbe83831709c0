use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{error, info};

use super::{webhook_url, RemoteWorkflow, WorkflowEngine, WorkflowError};
use crate::config::WorkflowConfig;

const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// HTTP client for the n8n public REST API.
pub struct N8nClient {
    client: Client,
    host: String,
    api_key: String,
}

impl N8nClient {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            client: Client::new(),
            host: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, WorkflowError> {
        if self.host.is_empty() {
            return Err(WorkflowError::NotConfigured);
        }
        let url = format!("{}{}", self.host, path);
        Ok(self.client.request(method, url).header(API_KEY_HEADER, &self.api_key))
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response, WorkflowError> {
        let response = request.send().await.map_err(|e| {
            error!("n8n {} request failed: {}", action, e);
            WorkflowError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("n8n {} returned {}: {}", action, status, body);
            return Err(WorkflowError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json(&self, request: RequestBuilder, action: &str) -> Result<Value, WorkflowError> {
        let response = self.send(request, action).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| WorkflowError::InvalidResponse(format!("{}: {}", action, e)))
    }
}

#[async_trait]
impl WorkflowEngine for N8nClient {
    async fn create_workflow(&self, name: &str, workflow: &Value) -> Result<RemoteWorkflow, WorkflowError> {
        info!("Creating n8n workflow: {}", name);

        let body = json!({
            "name": name,
            "nodes": workflow.get("nodes").cloned().unwrap_or_else(|| json!([])),
            "connections": workflow.get("connections").cloned().unwrap_or_else(|| json!({})),
            "settings": workflow.get("settings").cloned().unwrap_or_else(|| json!({})),
        });
        let request = self.request(Method::POST, "/api/v1/workflows")?.json(&body);
        let data = self.send_json(request, "create workflow").await?;

        let id = match data.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(WorkflowError::InvalidResponse("created workflow has no id".to_string())),
        };
        let webhook_url = data.get("nodes").and_then(|nodes| webhook_url(&self.host, &id, nodes));

        Ok(RemoteWorkflow {
            name: data.get("name").and_then(Value::as_str).unwrap_or(name).to_string(),
            active: data.get("active").and_then(Value::as_bool).unwrap_or(false),
            id,
            webhook_url,
        })
    }

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        info!("Activating n8n workflow: {}", workflow_id);
        let request = self.request(Method::POST, &format!("/api/v1/workflows/{}/activate", workflow_id))?;
        self.send(request, "activate workflow").await.map(|_| ())
    }

    async fn deactivate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        info!("Deactivating n8n workflow: {}", workflow_id);
        let request = self.request(Method::POST, &format!("/api/v1/workflows/{}/deactivate", workflow_id))?;
        self.send(request, "deactivate workflow").await.map(|_| ())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        info!("Deleting n8n workflow: {}", workflow_id);
        let request = self.request(Method::DELETE, &format!("/api/v1/workflows/{}", workflow_id))?;
        self.send(request, "delete workflow").await.map(|_| ())
    }

    async fn execute_workflow(&self, workflow_id: &str, data: Option<Value>) -> Result<Value, WorkflowError> {
        info!("Triggering n8n workflow: {}", workflow_id);
        let request = self
            .request(Method::POST, &format!("/api/v1/workflows/{}/execute", workflow_id))?
            .json(&json!({ "data": data }));
        self.send_json(request, "execute workflow").await
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Value, WorkflowError> {
        let request = self.request(Method::GET, &format!("/api/v1/executions/{}", execution_id))?;
        self.send_json(request, "get execution").await
    }
}
