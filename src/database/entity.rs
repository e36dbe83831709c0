use serde::{Deserialize, Serialize};

/// Column holding the owning tenant on every tenant-owned table.
pub const TENANT_COLUMN: &str = "tenant_id";

/// Identifier-shaped columns that hold engine strings rather than uuids.
const TEXT_ID_COLUMNS: [&str; 2] = ["workflow_id", "external_execution_id"];

/// Postgres type a text filter parameter must be cast to when compared
/// against `column`. Keys are `id`/`*_id` uuids and instants are `*_at`.
pub fn column_cast(column: &str) -> Option<&'static str> {
    if TEXT_ID_COLUMNS.contains(&column) {
        None
    } else if column == "id" || column.ends_with("_id") {
        Some("uuid")
    } else if column.ends_with("_at") {
        Some("timestamptz")
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// Shared across all tenants (catalog and tenant registry).
    Global,
    /// Rows belong to exactly one tenant via [`TENANT_COLUMN`].
    TenantOwned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Tenant,
    Plan,
    AutomationTemplate,

    User,
    Subscription,
    ApiKey,
    AutomationInstance,
    AutomationExecution,

    // CRM
    Company,
    Contact,
    Pipeline,
    PipelineStage,
    Deal,

    // Tourism
    Customer,
    Guide,
    Tour,
    Booking,
    MessageHistory,
}

impl EntityKind {
    pub const ALL: [EntityKind; 18] = [
        EntityKind::Tenant,
        EntityKind::Plan,
        EntityKind::AutomationTemplate,
        EntityKind::User,
        EntityKind::Subscription,
        EntityKind::ApiKey,
        EntityKind::AutomationInstance,
        EntityKind::AutomationExecution,
        EntityKind::Company,
        EntityKind::Contact,
        EntityKind::Pipeline,
        EntityKind::PipelineStage,
        EntityKind::Deal,
        EntityKind::Customer,
        EntityKind::Guide,
        EntityKind::Tour,
        EntityKind::Booking,
        EntityKind::MessageHistory,
    ];

    pub fn ownership(&self) -> Ownership {
        match self {
            EntityKind::Tenant | EntityKind::Plan | EntityKind::AutomationTemplate => Ownership::Global,
            _ => Ownership::TenantOwned,
        }
    }

    pub fn is_tenant_owned(&self) -> bool {
        self.ownership() == Ownership::TenantOwned
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Tenant => "tenants",
            EntityKind::Plan => "plans",
            EntityKind::AutomationTemplate => "automation_templates",
            EntityKind::User => "users",
            EntityKind::Subscription => "subscriptions",
            EntityKind::ApiKey => "api_keys",
            EntityKind::AutomationInstance => "automation_instances",
            EntityKind::AutomationExecution => "automation_executions",
            EntityKind::Company => "companies",
            EntityKind::Contact => "contacts",
            EntityKind::Pipeline => "pipelines",
            EntityKind::PipelineStage => "pipeline_stages",
            EntityKind::Deal => "deals",
            EntityKind::Customer => "customers",
            EntityKind::Guide => "guides",
            EntityKind::Tour => "tours",
            EntityKind::Booking => "bookings",
            EntityKind::MessageHistory => "message_history",
        }
    }

    /// Columns carrying a unique constraint besides `id`.
    pub fn unique_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Tenant | EntityKind::Plan | EntityKind::AutomationTemplate => &["slug"],
            EntityKind::User => &["email"],
            EntityKind::Subscription => &["tenant_id"],
            EntityKind::ApiKey => &["key_hash"],
            EntityKind::AutomationExecution => &["external_execution_id"],
            _ => &[],
        }
    }

    /// Whether rows carry `created_at`/`updated_at` maintained on write.
    pub fn has_timestamps(&self) -> bool {
        !matches!(self, EntityKind::AutomationExecution)
    }
}
