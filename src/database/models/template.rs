use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::entity::EntityKind;
use crate::database::repository::{Entity, GlobalEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationTemplate {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    pub icon: Option<String>,
    /// Form fields the tenant fills in; each `key` feeds a `{{config.key}}` placeholder.
    #[serde(default)]
    pub required_inputs: Value,
    #[serde(default)]
    pub workflow_json: Value,
    #[serde(default = "crate::database::models::plan::default_true")]
    pub is_active: bool,
    #[serde(default = "crate::database::models::plan::default_true")]
    pub is_public: bool,
}

impl Entity for AutomationTemplate {
    const KIND: EntityKind = EntityKind::AutomationTemplate;
}

impl GlobalEntity for AutomationTemplate {}
