use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::EntityKind;
use crate::database::repository::{Entity, GlobalEntity};

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_monthly: f64,
    pub price_currency: String,
    pub max_workflows: i64,
    pub max_executions_per_month: i64,
    pub max_users: i64,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

impl Entity for Plan {
    const KIND: EntityKind = EntityKind::Plan;
}

impl GlobalEntity for Plan {}
