use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::entity::EntityKind;
use crate::database::repository::{Entity, TenantOwned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationStatus {
    Active,
    Inactive,
    Paused,
    Error,
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationStatus::Active => "ACTIVE",
            AutomationStatus::Inactive => "INACTIVE",
            AutomationStatus::Paused => "PAUSED",
            AutomationStatus::Error => "ERROR",
        }
    }
}

/// A tenant's configured copy of a template, mirrored by one workflow in
/// the engine once activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationInstance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub config: Value,
    pub status: AutomationStatus,
    pub workflow_id: Option<String>,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub execution_count: i64,
    #[serde(default)]
    pub error_count: i64,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for AutomationInstance {
    const KIND: EntityKind = EntityKind::AutomationInstance;
}

impl TenantOwned for AutomationInstance {}
