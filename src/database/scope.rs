//! Tenant scoping of data-access arguments.
//!
//! Every query that reaches a store passes through [`scope_to_tenant`] (or
//! [`apply_tenant_scope`], which reads the ambient context). Global entities
//! pass through untouched; tenant-owned entities get their filters and
//! payloads pinned to one tenant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::entity::{EntityKind, TENANT_COLUMN};
use crate::tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    FindUnique,
    FindFirst,
    FindMany,
    Count,
    Aggregate,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
}

impl Operation {
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::FindUnique | Operation::FindFirst | Operation::FindMany | Operation::Count | Operation::Aggregate
        )
    }
}

/// Arguments of a data-access call, shaped like the JSON the store accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryArgs {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Value>,
}

impl QueryArgs {
    pub fn with_where(where_clause: Value) -> Self {
        Self {
            where_clause: Some(where_clause),
            ..Self::default()
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }
}

/// Rewrite `args` so `operation` on `kind` only touches `tenant_id`'s rows.
pub fn scope_to_tenant(kind: EntityKind, operation: Operation, mut args: QueryArgs, tenant_id: Uuid) -> QueryArgs {
    if !kind.is_tenant_owned() {
        return args;
    }

    let tenant = Value::String(tenant_id.to_string());

    match operation {
        Operation::Create => {
            args.data = Some(with_tenant(args.data.take(), &tenant));
        }
        Operation::CreateMany => {
            args.data = Some(match args.data.take() {
                Some(Value::Array(items)) => {
                    Value::Array(items.into_iter().map(|item| with_tenant(Some(item), &tenant)).collect())
                }
                other => with_tenant(other, &tenant),
            });
        }
        Operation::Upsert => {
            args.where_clause = Some(with_tenant(args.where_clause.take(), &tenant));
            args.create = Some(with_tenant(args.create.take(), &tenant));
            args.update = args.update.take().map(without_tenant);
        }
        Operation::Update | Operation::UpdateMany => {
            args.where_clause = Some(with_tenant(args.where_clause.take(), &tenant));
            args.data = args.data.take().map(without_tenant);
        }
        // Reads, counts, aggregates and deletes only need the filter.
        _ => {
            args.where_clause = Some(with_tenant(args.where_clause.take(), &tenant));
        }
    }

    args
}

/// [`scope_to_tenant`] with the tenant taken from the ambient context.
///
/// A tenant-owned operation without a context is passed through unchanged
/// and reported, since it would otherwise see every tenant's rows.
pub fn apply_tenant_scope(kind: EntityKind, operation: Operation, args: QueryArgs) -> QueryArgs {
    match tenant::current_tenant_id() {
        Some(tenant_id) => scope_to_tenant(kind, operation, args, tenant_id),
        None => {
            if kind.is_tenant_owned() {
                tracing::warn!(
                    entity = ?kind,
                    operation = ?operation,
                    "Tenant-owned operation executed without tenant context"
                );
            }
            args
        }
    }
}

fn with_tenant(value: Option<Value>, tenant: &Value) -> Value {
    let mut obj = match value {
        Some(Value::Object(obj)) => obj,
        _ => Map::new(),
    };
    obj.insert(TENANT_COLUMN.to_string(), tenant.clone());
    Value::Object(obj)
}

fn without_tenant(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => {
            obj.remove(TENANT_COLUMN);
            Value::Object(obj)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::run_with_context_sync;
    use crate::tenant::TenantContext;
    use crate::test_support::capture;
    use serde_json::json;
    use tracing::Level;

    #[test]
    fn global_entities_are_untouched() {
        let args = QueryArgs::with_where(json!({"slug": "start"}));
        let scoped = scope_to_tenant(EntityKind::Plan, Operation::FindFirst, args.clone(), Uuid::new_v4());
        assert_eq!(scoped, args);
    }

    #[test]
    fn reads_override_caller_tenant() {
        let tenant = Uuid::new_v4();
        let args = QueryArgs::with_where(json!({"tenant_id": Uuid::new_v4().to_string(), "status": "ACTIVE"}));
        let scoped = scope_to_tenant(EntityKind::AutomationInstance, Operation::FindMany, args, tenant);
        assert_eq!(
            scoped.where_clause,
            Some(json!({"tenant_id": tenant.to_string(), "status": "ACTIVE"}))
        );
    }

    #[test]
    fn missing_where_becomes_tenant_filter() {
        let tenant = Uuid::new_v4();
        let scoped = scope_to_tenant(EntityKind::User, Operation::Count, QueryArgs::default(), tenant);
        assert_eq!(scoped.where_clause, Some(json!({"tenant_id": tenant.to_string()})));
    }

    #[test]
    fn create_injects_tenant() {
        let tenant = Uuid::new_v4();
        let scoped = scope_to_tenant(
            EntityKind::User,
            Operation::Create,
            QueryArgs::with_data(json!({"email": "a@b.c", "tenant_id": "someone-else"})),
            tenant,
        );
        assert_eq!(scoped.data, Some(json!({"email": "a@b.c", "tenant_id": tenant.to_string()})));
    }

    #[test]
    fn create_many_injects_every_element() {
        let tenant = Uuid::new_v4();
        let scoped = scope_to_tenant(
            EntityKind::Contact,
            Operation::CreateMany,
            QueryArgs::with_data(json!([{"name": "a"}, {"name": "b"}])),
            tenant,
        );
        let items = scoped.data.unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["tenant_id"] == json!(tenant.to_string())));
    }

    #[test]
    fn update_cannot_move_rows_across_tenants() {
        let tenant = Uuid::new_v4();
        let args = QueryArgs {
            where_clause: Some(json!({"id": "x"})),
            data: Some(json!({"name": "renamed", "tenant_id": Uuid::new_v4().to_string()})),
            ..QueryArgs::default()
        };
        let scoped = scope_to_tenant(EntityKind::AutomationInstance, Operation::Update, args, tenant);
        assert_eq!(scoped.where_clause, Some(json!({"id": "x", "tenant_id": tenant.to_string()})));
        assert_eq!(scoped.data, Some(json!({"name": "renamed"})));
    }

    #[test]
    fn upsert_scopes_where_create_and_update() {
        let tenant = Uuid::new_v4();
        let args = QueryArgs {
            where_clause: Some(json!({"external_execution_id": "42"})),
            create: Some(json!({"status": "RUNNING"})),
            update: Some(json!({"status": "SUCCESS", "tenant_id": "other"})),
            ..QueryArgs::default()
        };
        let scoped = scope_to_tenant(EntityKind::AutomationExecution, Operation::Upsert, args, tenant);
        assert_eq!(scoped.where_clause.unwrap()["tenant_id"], json!(tenant.to_string()));
        assert_eq!(scoped.create.unwrap()["tenant_id"], json!(tenant.to_string()));
        assert_eq!(scoped.update, Some(json!({"status": "SUCCESS"})));
    }

    #[test]
    fn ambient_scope_uses_context_or_passes_through() {
        let tenant = Uuid::new_v4();
        let args = QueryArgs::with_where(json!({"id": "x"}));

        let unscoped = apply_tenant_scope(EntityKind::User, Operation::Delete, args.clone());
        assert_eq!(unscoped, args);

        let scoped = run_with_context_sync(TenantContext::new(tenant), || {
            apply_tenant_scope(EntityKind::User, Operation::Delete, args.clone())
        });
        assert_eq!(scoped.where_clause, Some(json!({"id": "x", "tenant_id": tenant.to_string()})));
    }

    #[test]
    fn missing_context_on_tenant_owned_entity_warns() {
        let args = QueryArgs::with_where(json!({"id": "x"}));

        let (_, logs) = capture(Level::WARN, || apply_tenant_scope(EntityKind::AutomationInstance, Operation::FindMany, args.clone()));
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("Tenant-owned operation executed without tenant context"), "{}", logs);
        assert!(logs.contains("entity=AutomationInstance"), "{}", logs);
        assert!(logs.contains("operation=FindMany"), "{}", logs);

        let (_, logs) = capture(Level::WARN, || apply_tenant_scope(EntityKind::Plan, Operation::FindMany, args.clone()));
        assert!(logs.is_empty(), "{}", logs);

        let (_, logs) = capture(Level::WARN, || {
            run_with_context_sync(TenantContext::new(Uuid::new_v4()), || {
                apply_tenant_scope(EntityKind::AutomationInstance, Operation::FindMany, args.clone())
            })
        });
        assert!(logs.is_empty(), "{}", logs);
    }
}
