use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::entity::EntityKind;
use crate::database::repository::{Entity, TenantOwned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    /// Map the engine's status vocabulary; anything unknown is still running.
    pub fn from_engine(status: &str) -> Self {
        match status {
            "success" => ExecutionStatus::Success,
            "error" => ExecutionStatus::Error,
            _ => ExecutionStatus::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub automation_instance_id: Uuid,
    pub external_execution_id: String,
    pub status: ExecutionStatus,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Entity for AutomationExecution {
    const KIND: EntityKind = EntityKind::AutomationExecution;
}

impl TenantOwned for AutomationExecution {}
