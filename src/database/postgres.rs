use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Postgres, Row as _};
use tracing::info;

use super::entity::column_cast;
use super::store::{increment_amount, Row, Store, StoreError, WriteBatch};
use crate::config::DatabaseConfig;
use crate::filter::{validate_identifier, Filter, FilterData, SqlResult};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

const UNIQUE_VIOLATION: &str = "23505";

/// sqlx-backed store. Rows travel as JSON: inserts go through
/// `jsonb_populate_record` and selects come back via `to_jsonb`, so the
/// same `Row` shape works for every table.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("Connected to Postgres (max_connections={})", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("migration failed: {}", e)))
    }

    /// Filter for `table` with typed-column casts applied.
    fn filter(table: &str, where_clause: Option<Value>) -> Result<Filter, StoreError> {
        let mut filter = Filter::new(table)?;
        filter.cast_columns(column_cast);
        if let Some(where_clause) = where_clause {
            filter.where_clause(where_clause)?;
        }
        Ok(filter)
    }

    fn select_sql(table: &str, filter_data: FilterData) -> Result<SqlResult, StoreError> {
        let mut filter = Self::filter(table, None)?;
        filter.assign(filter_data)?;
        Ok(filter.to_json_sql()?)
    }

    fn sum_sql(table: &str, column: &str, where_clause: Option<Value>) -> Result<SqlResult, StoreError> {
        validate_identifier(column).map_err(StoreError::Query)?;
        let where_sql = Self::filter(table, where_clause)?.to_where_sql(0)?;
        let mut query = format!("SELECT COALESCE(SUM(\"{}\"), 0)::float8 AS total FROM \"{}\"", column, table);
        if !where_sql.query.is_empty() {
            query.push_str(&format!(" WHERE {}", where_sql.query));
        }
        Ok(SqlResult { query, params: where_sql.params })
    }

    /// UPDATE for `patch`. Filter and increment parameters come first in
    /// `params`; plain assignments share one trailing jsonb record, returned
    /// separately and bound last.
    fn update_sql(table: &str, where_clause: Option<Value>, patch: &Row) -> Result<(SqlResult, Option<Row>), StoreError> {
        let where_sql = Self::filter(table, where_clause)?.to_where_sql(0)?;
        let mut params = where_sql.params;

        let mut assignments = Vec::with_capacity(patch.len());
        let mut plain = Row::new();
        for (column, value) in patch {
            validate_identifier(column).map_err(StoreError::Query)?;
            match increment_amount(value) {
                Some(by) => {
                    params.push(by.clone());
                    assignments.push(format!("\"{c}\" = COALESCE(\"{c}\", 0) + ${n}", c = column, n = params.len()));
                }
                None => {
                    plain.insert(column.clone(), value.clone());
                }
            }
        }
        let record_param = params.len() + 1;
        for column in plain.keys() {
            assignments.push(format!(
                "\"{c}\" = (jsonb_populate_record(NULL::\"{t}\", ${n})).\"{c}\"",
                c = column,
                t = table,
                n = record_param
            ));
        }

        let mut query = format!("UPDATE \"{}\" SET {}", table, assignments.join(", "));
        if !where_sql.query.is_empty() {
            query.push_str(&format!(" WHERE {}", where_sql.query));
        }
        let plain = if plain.is_empty() { None } else { Some(plain) };
        Ok((SqlResult { query, params }, plain))
    }

    /// Insert only the columns present in `row` so column defaults apply
    /// to the rest.
    fn insert_sql(table: &str, row: &Row) -> Result<String, StoreError> {
        Filter::new(table)?;
        let mut columns = Vec::with_capacity(row.len());
        for column in row.keys() {
            validate_identifier(column).map_err(StoreError::Query)?;
            columns.push(format!("\"{}\"", column));
        }
        let columns = columns.join(", ");
        Ok(format!(
            "INSERT INTO \"{t}\" ({c}) SELECT {c} FROM jsonb_populate_record(NULL::\"{t}\", $1) RETURNING to_jsonb(\"{t}\".*) AS row",
            t = table,
            c = columns
        ))
    }

    fn decode(row: sqlx::postgres::PgRow) -> Result<Row, StoreError> {
        let value: Value = row.try_get("row")?;
        match value {
            Value::Object(obj) => Ok(obj),
            other => Err(StoreError::Decode(format!("expected JSON object row, got {}", other))),
        }
    }

    fn log_query(sql: &str) {
        if crate::config::CONFIG.database.enable_query_logging {
            tracing::debug!(target: "moovelabs_api::sql", "{}", sql);
        }
    }
}

/// Bind a filter parameter. Strings always bind as text; the generated SQL
/// casts them where the column is a uuid or timestamp.
fn bind_param<'q>(q: PgQuery<'q>, v: &Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v.clone())),
    }
}

fn bind_all<'q>(mut q: PgQuery<'q>, params: &[Value]) -> PgQuery<'q> {
    for p in params {
        q = bind_param(q, p);
    }
    q
}

fn map_write_error(table: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(format!(
                "duplicate value for {} ({})",
                table,
                db.constraint().unwrap_or("unique constraint")
            ))
        }
        other => StoreError::Sqlx(other),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_many(&self, table: &str, filter_data: FilterData) -> Result<Vec<Row>, StoreError> {
        let sql = Self::select_sql(table, filter_data)?;
        Self::log_query(&sql.query);

        let rows = bind_all(sqlx::query(&sql.query), &sql.params).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::decode).collect()
    }

    async fn count(&self, table: &str, where_clause: Option<Value>) -> Result<i64, StoreError> {
        let sql = Self::filter(table, where_clause)?.to_count_sql()?;
        Self::log_query(&sql.query);

        let row = bind_all(sqlx::query(&sql.query), &sql.params).fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    async fn sum(&self, table: &str, column: &str, where_clause: Option<Value>) -> Result<f64, StoreError> {
        let sql = Self::sum_sql(table, column, where_clause)?;
        Self::log_query(&sql.query);

        let row = bind_all(sqlx::query(&sql.query), &sql.params).fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let sql = Self::insert_sql(table, &row)?;
        Self::log_query(&sql);

        let inserted = sqlx::query(&sql)
            .bind(sqlx::types::Json(Value::Object(row)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(table, e))?;
        Self::decode(inserted)
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let sql = Self::insert_sql(table, &row)?;
            let out = sqlx::query(&sql)
                .bind(sqlx::types::Json(Value::Object(row)))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_write_error(table, e))?;
            inserted.push(Self::decode(out)?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_many(&self, table: &str, where_clause: Option<Value>, patch: Row) -> Result<u64, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let (sql, plain) = Self::update_sql(table, where_clause, &patch)?;
        Self::log_query(&sql.query);

        let mut q = bind_all(sqlx::query(&sql.query), &sql.params);
        if let Some(plain) = plain {
            q = q.bind(sqlx::types::Json(Value::Object(plain)));
        }
        let result = q.execute(&self.pool).await.map_err(|e| map_write_error(table, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, table: &str, where_clause: Option<Value>) -> Result<u64, StoreError> {
        let sql = Self::filter(table, where_clause)?.to_delete_sql()?;
        Self::log_query(&sql.query);

        let result = bind_all(sqlx::query(&sql.query), &sql.params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (table, row) in batch.into_inserts() {
            let sql = Self::insert_sql(&table, &row)?;
            sqlx::query(&sql)
                .bind(sqlx::types::Json(Value::Object(row)))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(&table, e))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
