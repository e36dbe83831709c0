use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{webhook_url, RemoteWorkflow, WorkflowEngine, WorkflowError};

pub const FAKE_HOST: &str = "http://n8n.test";

/// In-process engine that records every call.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
    pub fail_deletes: AtomicBool,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Workflow bodies passed to `create_workflow`, in order.
    pub fn created(&self) -> Vec<Value> {
        self.created.lock().map(|created| created.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn create_workflow(&self, name: &str, workflow: &Value) -> Result<RemoteWorkflow, WorkflowError> {
        let id = format!("wf-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(format!("create:{}", name));
        if let Ok(mut created) = self.created.lock() {
            created.push(workflow.clone());
        }
        Ok(RemoteWorkflow {
            webhook_url: workflow.get("nodes").and_then(|nodes| webhook_url(FAKE_HOST, &id, nodes)),
            name: name.to_string(),
            active: false,
            id,
        })
    }

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        self.record(format!("activate:{}", workflow_id));
        Ok(())
    }

    async fn deactivate_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        self.record(format!("deactivate:{}", workflow_id));
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        self.record(format!("delete:{}", workflow_id));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(WorkflowError::Status {
                status: 404,
                body: "workflow not found".into(),
            });
        }
        Ok(())
    }

    async fn execute_workflow(&self, workflow_id: &str, data: Option<Value>) -> Result<Value, WorkflowError> {
        self.record(format!("execute:{}", workflow_id));
        Ok(json!({ "executionId": format!("exec-{}", workflow_id), "data": data }))
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Value, WorkflowError> {
        self.record(format!("get_execution:{}", execution_id));
        Ok(json!({ "id": execution_id, "status": "success", "finished": true }))
    }
}
