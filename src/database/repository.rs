use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use super::entity::EntityKind;
use super::scope::{apply_tenant_scope, scope_to_tenant, Operation, QueryArgs};
use super::store::{Row, Store, StoreError};
use crate::filter::FilterData;

/// A persisted model tied to one entity kind.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;
}

/// Marker for entities whose rows belong to a single tenant.
pub trait TenantOwned: Entity {}

/// Marker for entities shared across tenants.
pub trait GlobalEntity: Entity {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Pinned to one tenant.
    Tenant(Uuid),
    /// Whatever tenant the ambient context carries.
    Ambient,
    /// No scoping at all.
    Unscoped,
}

/// Typed access to one table with tenant scoping applied to every call.
pub struct Repository<T> {
    store: Arc<dyn Store>,
    scope: Scope,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scope: self.scope,
            _phantom: PhantomData,
        }
    }
}

impl<T: TenantOwned> Repository<T> {
    /// Repository whose every operation is confined to `tenant_id`.
    pub fn for_tenant(store: Arc<dyn Store>, tenant_id: Uuid) -> Self {
        Self::with_scope(store, Scope::Tenant(tenant_id))
    }
}

impl<T: GlobalEntity> Repository<T> {
    pub fn catalog(store: Arc<dyn Store>) -> Self {
        Self::with_scope(store, Scope::Unscoped)
    }
}

impl<T: Entity> Repository<T> {
    fn with_scope(store: Arc<dyn Store>, scope: Scope) -> Self {
        Self {
            store,
            scope,
            _phantom: PhantomData,
        }
    }

    /// Repository scoped by the ambient tenant context at call time.
    pub fn scoped(store: Arc<dyn Store>) -> Self {
        Self::with_scope(store, Scope::Ambient)
    }

    /// Unscoped access across all tenants. Only for lookups that happen
    /// before a tenant is known, such as login and engine callbacks.
    pub fn system(store: Arc<dyn Store>) -> Self {
        Self::with_scope(store, Scope::Unscoped)
    }

    fn table(&self) -> &'static str {
        T::KIND.table_name()
    }

    fn scope_args(&self, operation: Operation, args: QueryArgs) -> QueryArgs {
        match self.scope {
            Scope::Tenant(tenant_id) => scope_to_tenant(T::KIND, operation, args, tenant_id),
            Scope::Ambient => apply_tenant_scope(T::KIND, operation, args),
            Scope::Unscoped => args,
        }
    }

    fn scope_where(&self, operation: Operation, where_clause: Option<Value>) -> Option<Value> {
        self.scope_args(
            operation,
            QueryArgs {
                where_clause,
                ..QueryArgs::default()
            },
        )
        .where_clause
    }

    fn decode(row: Row) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(row)).map_err(|e| {
            StoreError::Decode(format!("{} row: {}", T::KIND.table_name(), e))
        })
    }

    fn into_row(value: Option<Value>) -> Result<Row, StoreError> {
        match value {
            Some(Value::Object(obj)) => Ok(obj),
            _ => Err(StoreError::Query(format!("{} payload must be a JSON object", T::KIND.table_name()))),
        }
    }

    fn stamp_new(mut row: Row) -> Row {
        if !row.contains_key("id") {
            row.insert("id".into(), json!(Uuid::new_v4()));
        }
        if T::KIND.has_timestamps() {
            let now = json!(Utc::now());
            row.entry("created_at").or_insert_with(|| now.clone());
            row.entry("updated_at").or_insert(now);
        }
        row
    }

    fn stamp_update(mut row: Row) -> Row {
        row.remove("id");
        if T::KIND.has_timestamps() {
            row.insert("updated_at".into(), json!(Utc::now()));
        }
        row
    }

    pub async fn find_many(&self, mut filter: FilterData) -> Result<Vec<T>, StoreError> {
        filter.where_clause = self.scope_where(Operation::FindMany, filter.where_clause.take());
        let rows = self.store.find_many(self.table(), filter).await?;
        rows.into_iter().map(Self::decode).collect()
    }

    pub async fn find_first(&self, mut filter: FilterData) -> Result<Option<T>, StoreError> {
        filter.where_clause = self.scope_where(Operation::FindFirst, filter.where_clause.take());
        filter.limit = Some(1);
        let rows = self.store.find_many(self.table(), filter).await?;
        rows.into_iter().next().map(Self::decode).transpose()
    }

    pub async fn find_unique(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let filter = FilterData {
            where_clause: self.scope_where(Operation::FindUnique, Some(json!({ "id": id }))),
            limit: Some(1),
            ..FilterData::default()
        };
        let rows = self.store.find_many(self.table(), filter).await?;
        rows.into_iter().next().map(Self::decode).transpose()
    }

    pub async fn count(&self, where_clause: Option<Value>) -> Result<i64, StoreError> {
        let where_clause = self.scope_where(Operation::Count, where_clause);
        self.store.count(self.table(), where_clause).await
    }

    pub async fn sum(&self, column: &str, where_clause: Option<Value>) -> Result<f64, StoreError> {
        let where_clause = self.scope_where(Operation::Aggregate, where_clause);
        self.store.sum(self.table(), column, where_clause).await
    }

    /// Scope and stamp a create payload without writing it, for use in a
    /// [`super::WriteBatch`].
    pub fn prepare_create(&self, data: Value) -> Result<Row, StoreError> {
        let args = self.scope_args(Operation::Create, QueryArgs::with_data(data));
        Ok(Self::stamp_new(Self::into_row(args.data)?))
    }

    pub async fn create(&self, data: Value) -> Result<T, StoreError> {
        let row = self.prepare_create(data)?;
        Self::decode(self.store.insert(self.table(), row).await?)
    }

    pub async fn create_many(&self, items: Vec<Value>) -> Result<Vec<T>, StoreError> {
        let args = self.scope_args(Operation::CreateMany, QueryArgs::with_data(Value::Array(items)));
        let rows = match args.data {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| Self::into_row(Some(item)).map(Self::stamp_new))
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![Self::stamp_new(Self::into_row(other)?)],
        };
        let inserted = self.store.insert_many(self.table(), rows).await?;
        inserted.into_iter().map(Self::decode).collect()
    }

    /// Update one row by id. `None` when no row is visible in this scope.
    pub async fn update(&self, id: Uuid, data: Value) -> Result<Option<T>, StoreError> {
        let args = self.scope_args(
            Operation::Update,
            QueryArgs {
                where_clause: Some(json!({ "id": id })),
                data: Some(data),
                ..QueryArgs::default()
            },
        );
        let patch = Self::stamp_update(Self::into_row(args.data)?);
        let affected = self.store.update_many(self.table(), args.where_clause, patch).await?;
        if affected == 0 {
            return Ok(None);
        }
        self.find_unique(id).await
    }

    pub async fn update_many(&self, where_clause: Value, data: Value) -> Result<u64, StoreError> {
        let args = self.scope_args(
            Operation::UpdateMany,
            QueryArgs {
                where_clause: Some(where_clause),
                data: Some(data),
                ..QueryArgs::default()
            },
        );
        let patch = Self::stamp_update(Self::into_row(args.data)?);
        self.store.update_many(self.table(), args.where_clause, patch).await
    }

    /// Update the row matching `where_clause`, or create it from `create`.
    ///
    /// A concurrent insert of the same unique key surfaces as a conflict on
    /// create and is retried as an update.
    pub async fn upsert(&self, where_clause: Value, create: Value, update: Value) -> Result<T, StoreError> {
        let args = self.scope_args(
            Operation::Upsert,
            QueryArgs {
                where_clause: Some(where_clause),
                create: Some(create),
                update: Some(update),
                ..QueryArgs::default()
            },
        );
        let where_clause = args.where_clause;
        let patch = Self::stamp_update(Self::into_row(args.update)?);
        let lookup = FilterData {
            where_clause: where_clause.clone(),
            limit: Some(1),
            ..FilterData::default()
        };

        if self.store.update_many(self.table(), where_clause.clone(), patch.clone()).await? == 0 {
            let row = Self::stamp_new(Self::into_row(args.create)?);
            match self.store.insert(self.table(), row).await {
                Ok(inserted) => return Self::decode(inserted),
                Err(StoreError::Conflict(_)) => {
                    self.store.update_many(self.table(), where_clause, patch).await?;
                }
                Err(other) => return Err(other),
            }
        }

        let rows = self.store.find_many(self.table(), lookup).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Query(format!("{} upsert lost its row", self.table())))?;
        Self::decode(row)
    }

    /// Delete one row by id. `false` when no row is visible in this scope.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let where_clause = self.scope_where(Operation::Delete, Some(json!({ "id": id })));
        Ok(self.store.delete_many(self.table(), where_clause).await? > 0)
    }

    pub async fn delete_many(&self, where_clause: Value) -> Result<u64, StoreError> {
        let where_clause = self.scope_where(Operation::DeleteMany, Some(where_clause));
        self.store.delete_many(self.table(), where_clause).await
    }
}
