use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ColumnCast, FilterData, FilterOrderInfo, SqlResult, WhereNode};

/// Identifier check shared by table, column and order names.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err("Identifier cannot be empty".to_string()),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            Err(format!("Invalid identifier format: {}", name))
        }
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Err(format!("Invalid identifier format: {}", name))
        }
        Some(_) => Ok(()),
    }
}

pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    column_cast: Option<ColumnCast>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(FilterError::InvalidTableName)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            column_cast: None,
        })
    }

    /// Cast text parameters for typed columns when rendering SQL.
    pub fn cast_columns(&mut self, column_cast: ColumnCast) -> &mut Self {
        self.column_cast = Some(column_cast);
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        else if let Some(offset) = data.offset { self.offset(offset)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in columns.iter().filter(|c| c.as_str() != "*") {
            validate_identifier(column).map_err(FilterError::InvalidColumn)?;
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        if let Some(off) = offset { self.offset(off)?; }
        Ok(self)
    }

    pub fn offset(&mut self, offset: i32) -> Result<&mut Self, FilterError> {
        if offset < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); }
        self.offset = Some(offset);
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn select_columns(&self) -> &[String] {
        &self.select_columns
    }

    pub fn order_info(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i32> {
        self.offset
    }

    /// The parsed condition tree, for evaluation outside SQL.
    pub fn where_nodes(&self) -> Result<Vec<WhereNode>, FilterError> {
        match self.where_data {
            Some(ref where_data) => FilterWhere::parse(where_data),
            None => Ok(vec![]),
        }
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        self.build_select(self.build_select_clause(), format!("\"{}\"", self.table_name))
    }

    /// Like [`Filter::to_sql`], but each result row is a single `row` jsonb
    /// column holding the selected columns.
    pub fn to_json_sql(&self) -> Result<SqlResult, FilterError> {
        let projection = if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "to_jsonb(t) AS row".to_string()
        } else {
            let pairs: Vec<String> = self.select_columns.iter().map(|c| format!("'{c}', t.\"{c}\"")).collect();
            format!("jsonb_build_object({}) AS row", pairs.join(", "))
        };
        self.build_select(projection, format!("\"{}\" t", self.table_name))
    }

    fn build_select(&self, select_clause: String, from_clause: String) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM {}", from_clause),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    /// WHERE body only, with placeholders numbered after `starting_param_index`.
    pub fn to_where_sql(&self, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        let (query, params) = match self.where_data {
            Some(ref where_data) => FilterWhere::generate_with_casts(where_data, starting_param_index, self.column_cast)?,
            None => (String::new(), vec![]),
        };
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let query = if where_result.query.is_empty() {
            format!("DELETE FROM \"{}\"", self.table_name)
        } else {
            format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
