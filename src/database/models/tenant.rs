use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::entity::EntityKind;
use crate::database::repository::{Entity, GlobalEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub logo: Option<String>,
    #[serde(default = "crate::database::models::plan::default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Tenant {
    const KIND: EntityKind = EntityKind::Tenant;
}

impl GlobalEntity for Tenant {}
