use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::entity::EntityKind;
use super::store::{increment_amount, Row, Store, StoreError, WriteBatch};
use crate::filter::{matcher, Filter, FilterData};

/// Process-local store over JSON rows, used when no database is configured
/// and in tests. Enforces `id` and per-entity unique columns.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    unique: HashMap<&'static str, &'static [&'static str]>,
    #[cfg(test)]
    failing_tables: std::sync::Mutex<Vec<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let unique = EntityKind::ALL
            .iter()
            .map(|kind| (kind.table_name(), kind.unique_columns()))
            .collect();
        Self {
            tables: RwLock::new(HashMap::new()),
            unique,
            #[cfg(test)]
            failing_tables: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent insert into `table` fail.
    #[cfg(test)]
    pub fn fail_inserts_into(&self, table: &str) {
        if let Ok(mut failing) = self.failing_tables.lock() {
            failing.push(table.to_string());
        }
    }

    #[cfg(test)]
    fn check_injected_failure(&self, table: &str) -> Result<(), StoreError> {
        match self.failing_tables.lock() {
            Ok(failing) if failing.iter().any(|t| t == table) => {
                Err(StoreError::Query(format!("injected failure on insert into {}", table)))
            }
            _ => Ok(()),
        }
    }

    #[cfg(not(test))]
    fn check_injected_failure(&self, _table: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn filter_for(table: &str, data: FilterData) -> Result<Filter, StoreError> {
        let mut filter = Filter::new(table)?;
        filter.assign(data)?;
        Ok(filter)
    }

    fn where_filter(table: &str, where_clause: Option<Value>) -> Result<Filter, StoreError> {
        Self::filter_for(
            table,
            FilterData {
                where_clause,
                ..FilterData::default()
            },
        )
    }

    fn unique_columns(&self, table: &str) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once("id").chain(self.unique.get(table).copied().unwrap_or(&[]).iter().copied())
    }

    /// Reject `row` if it collides with any of `existing` on a unique column.
    fn check_unique<'a, I>(&self, table: &str, row: &Row, existing: I) -> Result<(), StoreError>
    where
        I: Iterator<Item = &'a Row> + Clone,
    {
        for column in self.unique_columns(table) {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            if existing.clone().any(|other| other.get(column) == Some(value)) {
                return Err(StoreError::Conflict(format!(
                    "duplicate value for {}.{}",
                    table, column
                )));
            }
        }
        Ok(())
    }

    fn insert_into(&self, tables: &mut HashMap<String, Vec<Row>>, table: &str, mut row: Row) -> Result<Row, StoreError> {
        Filter::new(table)?;
        self.check_injected_failure(table)?;

        if !matches!(row.get("id"), Some(Value::String(_))) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        let rows = tables.entry(table.to_string()).or_default();
        self.check_unique(table, &row, rows.iter())?;
        rows.push(row.clone());
        Ok(row)
    }
}

fn apply_patch(row: &mut Row, patch: &Row) -> Result<(), StoreError> {
    for (column, value) in patch {
        match increment_amount(value) {
            Some(by) => {
                let current = row.get(column).and_then(Value::as_f64).unwrap_or(0.0);
                let by = by
                    .as_f64()
                    .ok_or_else(|| StoreError::Query(format!("$inc on {} requires a number", column)))?;
                let next = current + by;
                let next = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
                    Value::from(next as i64)
                } else {
                    Value::from(next)
                };
                row.insert(column.clone(), next);
            }
            None => {
                row.insert(column.clone(), value.clone());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_many(&self, table: &str, filter: FilterData) -> Result<Vec<Row>, StoreError> {
        let filter = Self::filter_for(table, filter)?;
        let rows = self.tables.read().await.get(table).cloned().unwrap_or_default();
        Ok(matcher::apply(&filter, rows)?)
    }

    async fn count(&self, table: &str, where_clause: Option<Value>) -> Result<i64, StoreError> {
        let nodes = Self::where_filter(table, where_clause)?.where_nodes()?;
        let tables = self.tables.read().await;
        let count = tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| matcher::matches_all(&nodes, row)).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn sum(&self, table: &str, column: &str, where_clause: Option<Value>) -> Result<f64, StoreError> {
        let nodes = Self::where_filter(table, where_clause)?.where_nodes()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matcher::matches_all(&nodes, row))
                    .filter_map(|row| row.get(column).and_then(Value::as_f64))
                    .sum()
            })
            .unwrap_or(0.0))
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().await;
        self.insert_into(&mut tables, table, row)
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let mut tables = self.tables.write().await;
        let mut staged = HashMap::new();
        staged.insert(table.to_string(), tables.get(table).cloned().unwrap_or_default());

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(self.insert_into(&mut staged, table, row)?);
        }
        tables.extend(staged);
        Ok(inserted)
    }

    async fn update_many(&self, table: &str, where_clause: Option<Value>, patch: Row) -> Result<u64, StoreError> {
        let nodes = Self::where_filter(table, where_clause)?.where_nodes()?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut updated = rows.clone();
        let mut touched = Vec::new();
        for (index, row) in updated.iter_mut().enumerate() {
            if matcher::matches_all(&nodes, row) {
                apply_patch(row, &patch)?;
                touched.push(index);
            }
        }

        for &index in &touched {
            let others = updated.iter().enumerate().filter(|(i, _)| *i != index).map(|(_, r)| r);
            self.check_unique(table, &updated[index], others)?;
        }

        *rows = updated;
        Ok(touched.len() as u64)
    }

    async fn delete_many(&self, table: &str, where_clause: Option<Value>) -> Result<u64, StoreError> {
        let nodes = Self::where_filter(table, where_clause)?.where_nodes()?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matcher::matches_all(&nodes, row));
        Ok((before - rows.len()) as u64)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let inserts = batch.into_inserts();

        let mut staged: HashMap<String, Vec<Row>> = HashMap::new();
        for (table, _) in &inserts {
            staged
                .entry(table.clone())
                .or_insert_with(|| tables.get(table).cloned().unwrap_or_default());
        }
        for (table, row) in inserts {
            self.insert_into(&mut staged, &table, row)?;
        }

        tables.extend(staged);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
