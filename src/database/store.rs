use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterData, FilterError};

/// A stored row as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Inserts applied all-or-nothing by [`Store::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    inserts: Vec<(String, Row)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, row: Row) -> &mut Self {
        self.inserts.push((table.into(), row));
        self
    }

    pub fn len(&self) -> usize {
        self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }

    pub fn into_inserts(self) -> Vec<(String, Row)> {
        self.inserts
    }
}

/// Patch value that increments a numeric column instead of assigning it.
pub fn increment(by: i64) -> Value {
    serde_json::json!({ "$inc": by })
}

pub(crate) fn increment_amount(value: &Value) -> Option<&Value> {
    value.as_object().filter(|obj| obj.len() == 1).and_then(|obj| obj.get("$inc"))
}

/// Table-level persistence. Implementations do no tenant scoping of their
/// own; callers go through [`super::Repository`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_many(&self, table: &str, filter: FilterData) -> Result<Vec<Row>, StoreError>;

    async fn count(&self, table: &str, where_clause: Option<Value>) -> Result<i64, StoreError>;

    /// Sum of a numeric column over matching rows (0 when none match).
    async fn sum(&self, table: &str, column: &str, where_clause: Option<Value>) -> Result<f64, StoreError>;

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    /// Apply `patch` to matching rows, returning how many were affected.
    async fn update_many(&self, table: &str, where_clause: Option<Value>, patch: Row) -> Result<u64, StoreError>;

    async fn delete_many(&self, table: &str, where_clause: Option<Value>) -> Result<u64, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
