//! Workflow engine integration.
//!
//! Automations are realised as workflows in an external engine (n8n). The
//! rest of the crate talks to it through [`WorkflowEngine`] so tests can run
//! without a live engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod n8n;

#[cfg(test)]
pub mod fake;

pub use n8n::N8nClient;

/// Node type of the engine's inbound webhook trigger.
pub const WEBHOOK_NODE_TYPE: &str = "n8n-nodes-base.webhook";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow engine is not configured")]
    NotConfigured,

    #[error("Workflow engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Workflow engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected workflow engine response: {0}")]
    InvalidResponse(String),
}

/// A workflow as created in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWorkflow {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub webhook_url: Option<String>,
}

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Create a workflow named `name` from a template's workflow JSON
    /// (already customized).
    async fn create_workflow(&self, name: &str, workflow: &Value) -> Result<RemoteWorkflow, WorkflowError>;

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError>;

    async fn deactivate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError>;

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError>;

    async fn execute_workflow(&self, workflow_id: &str, data: Option<Value>) -> Result<Value, WorkflowError>;

    async fn get_execution(&self, execution_id: &str) -> Result<Value, WorkflowError>;
}

/// Replace `{{config.<key>}}` tokens in every string leaf of `workflow`.
///
/// Keys absent from `config` are left in place. Non-string config values
/// are rendered as their JSON text.
pub fn customize_workflow(workflow: &Value, config: &Map<String, Value>) -> Value {
    match workflow {
        Value::String(s) => Value::String(substitute(s, config)),
        Value::Array(items) => Value::Array(items.iter().map(|v| customize_workflow(v, config)).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), customize_workflow(v, config)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute(text: &str, config: &Map<String, Value>) -> String {
    let mut out = text.to_string();
    for (key, value) in config {
        let placeholder = format!("{{{{config.{}}}}}", key);
        if out.contains(&placeholder) {
            let replacement = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &replacement);
        }
    }
    out
}

/// Public URL of the first webhook trigger in a created workflow.
pub fn webhook_url(host: &str, workflow_id: &str, nodes: &Value) -> Option<String> {
    let node = nodes
        .as_array()?
        .iter()
        .find(|n| n.get("type").and_then(Value::as_str) == Some(WEBHOOK_NODE_TYPE))?;
    let path = node
        .pointer("/parameters/path")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(format!("{}/webhook/{}/{}", host.trim_end_matches('/'), workflow_id, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_are_replaced_in_nested_strings() {
        let workflow = json!({
            "nodes": [
                {"type": "n8n-nodes-base.httpRequest", "parameters": {"url": "https://api.example/{{config.account}}", "retries": 3}},
                {"type": "n8n-nodes-base.set", "parameters": {"values": ["{{config.greeting}}, {{config.account}}", "{{config.missing}}"]}}
            ]
        });
        let config = json!({"account": "acme", "greeting": "Olá", "unused": 1});
        let out = customize_workflow(&workflow, config.as_object().unwrap());

        assert_eq!(out["nodes"][0]["parameters"]["url"], "https://api.example/acme");
        assert_eq!(out["nodes"][0]["parameters"]["retries"], 3);
        assert_eq!(out["nodes"][1]["parameters"]["values"][0], "Olá, acme");
        assert_eq!(out["nodes"][1]["parameters"]["values"][1], "{{config.missing}}");
    }

    #[test]
    fn config_values_containing_quotes_stay_valid_json() {
        let workflow = json!({"text": "Hi {{config.name}}"});
        let config = json!({"name": "\"Bobby\" }"});
        let out = customize_workflow(&workflow, config.as_object().unwrap());
        assert_eq!(out["text"], "Hi \"Bobby\" }");
    }

    #[test]
    fn webhook_url_uses_first_webhook_node() {
        let nodes = json!([
            {"type": "n8n-nodes-base.set"},
            {"type": "n8n-nodes-base.webhook", "parameters": {"path": "whatsapp-lead"}}
        ]);
        assert_eq!(
            webhook_url("https://n8n.example/", "wf1", &nodes).as_deref(),
            Some("https://n8n.example/webhook/wf1/whatsapp-lead")
        );
        assert_eq!(webhook_url("https://n8n.example", "wf1", &json!([])), None);
    }
}
