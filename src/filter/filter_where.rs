use serde_json::Value;

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{ColumnCast, FilterOp, FilterWhereInfo, WhereNode};

/// Parses JSON `where` objects and renders them as parameterized SQL.
///
/// Placeholders are numbered from `starting_param_index + 1` so the clause
/// can be appended to statements that already bind earlier parameters.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    column_cast: Option<ColumnCast>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            column_cast: None,
        }
    }

    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        Self::generate_with_casts(where_data, starting_param_index, None)
    }

    /// String parameters bind as text; `column_cast` names the type each
    /// one is cast to in SQL when its column is not text.
    pub fn generate_with_casts(
        where_data: &Value,
        starting_param_index: usize,
        column_cast: Option<ColumnCast>,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let nodes = Self::parse(where_data)?;
        let mut filter_where = Self::new(starting_param_index);
        filter_where.column_cast = column_cast;
        let clause = filter_where.build_all(&nodes, " AND ")?;
        Ok((clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        Self::parse(where_data).map(|_| ())
    }

    /// Parse a `where` object into a condition tree.
    pub fn parse(where_data: &Value) -> Result<Vec<WhereNode>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut nodes = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        nodes.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        nodes.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(nodes)
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<WhereNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut branches = Vec::with_capacity(arr.len());
                for v in arr {
                    branches.push(WhereNode::And(Self::parse(v)?));
                }
                Ok(if op == "$and" { WhereNode::And(branches) } else { WhereNode::Or(branches) })
            }
            "$not" => Ok(WhereNode::Not(Self::parse(value)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<WhereNode>, FilterError> {
        validate_identifier(field).map_err(FilterError::InvalidColumn)?;

        let operator_object = value
            .as_object()
            .filter(|obj| !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')));

        match operator_object {
            Some(obj) => obj
                .iter()
                .map(|(op_key, op_val)| {
                    let operator = Self::map_operator(op_key)?;
                    Self::check_operator_data(operator, op_val)?;
                    Ok(WhereNode::Condition(FilterWhereInfo {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    }))
                })
                .collect(),
            // Implicit equality: { field: value }
            None => Ok(vec![WhereNode::Condition(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })]),
        }
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$exists" => FilterOp::Exists,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn check_operator_data(operator: FilterOp, data: &Value) -> Result<(), FilterError> {
        match operator {
            FilterOp::Between => match data.as_array() {
                Some(values) if values.len() == 2 => Ok(()),
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Exists | FilterOp::Null if !data.is_boolean() => Err(FilterError::InvalidOperatorData(
                "$exists and $null require a boolean".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn build_all(&mut self, nodes: &[WhereNode], joiner: &str) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(nodes.len());
        for node in nodes {
            parts.push(self.build_node(node)?);
        }
        Ok(parts.join(joiner))
    }

    fn build_node(&mut self, node: &WhereNode) -> Result<String, FilterError> {
        match node {
            WhereNode::Condition(info) => self.build_sql_condition(info),
            WhereNode::And(children) if children.is_empty() => Ok("1=1".to_string()),
            WhereNode::And(children) => Ok(format!("({})", self.build_all(children, " AND ")?)),
            WhereNode::Or(children) if children.is_empty() => Ok("1=0".to_string()),
            WhereNode::Or(children) => Ok(format!("({})", self.build_all(children, " OR ")?)),
            WhereNode::Not(children) if children.is_empty() => Ok("1=0".to_string()),
            WhereNode::Not(children) => Ok(format!("NOT ({})", self.build_all(children, " AND ")?)),
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        let data = &condition.data;
        let cast = match condition.operator {
            FilterOp::Like | FilterOp::ILike => None,
            _ => self.column_cast.and_then(|cast| cast(&condition.column)),
        };
        Ok(match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { format!("{} IS NULL", quoted_column) }
                else { format!("{} = {}", quoted_column, self.param(data.clone(), cast)) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("{} IS NOT NULL", quoted_column) }
                else { format!("{} IS DISTINCT FROM {}", quoted_column, self.param(data.clone(), cast)) }
            }
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone(), cast)),
            FilterOp::In | FilterOp::NIn => {
                let negate = condition.operator == FilterOp::NIn;
                match data {
                    Value::Array(values) if values.is_empty() => {
                        if negate { "1=1".to_string() } else { "1=0".to_string() }
                    }
                    Value::Array(values) => {
                        let params: Vec<String> = values.iter().map(|v| self.param(v.clone(), cast)).collect();
                        let keyword = if negate { "NOT IN" } else { "IN" };
                        format!("{} {} ({})", quoted_column, keyword, params.join(", "))
                    }
                    single => {
                        let op = if negate { "<>" } else { "=" };
                        format!("{} {} {}", quoted_column, op, self.param(single.clone(), cast))
                    }
                }
            }
            FilterOp::Between => {
                let values = data
                    .as_array()
                    .filter(|v| v.len() == 2)
                    .ok_or_else(|| FilterError::InvalidOperatorData("$between requires array with 2 values".to_string()))?;
                let low = self.param(values[0].clone(), cast);
                let high = self.param(values[1].clone(), cast);
                format!("{} BETWEEN {} AND {}", quoted_column, low, high)
            }
            FilterOp::Exists => {
                if data.as_bool().unwrap_or(true) { format!("{} IS NOT NULL", quoted_column) }
                else { format!("{} IS NULL", quoted_column) }
            }
            FilterOp::Null => {
                if data.as_bool().unwrap_or(true) { format!("{} IS NULL", quoted_column) }
                else { format!("{} IS NOT NULL", quoted_column) }
            }
        })
    }

    fn param(&mut self, value: Value, cast: Option<&str>) -> String {
        let typed = cast.filter(|_| value.is_string());
        self.param_values.push(value);
        self.param_index += 1;
        match typed {
            Some(ty) => format!("${}::{}", self.param_index, ty),
            None => format!("${}", self.param_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_operators() {
        let where_data = json!({"$and": [{"status": "ACTIVE"}, {"execution_count": {"$gte": 3}}]});
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(sql, "((\"status\" = $1) AND (\"execution_count\" >= $2))");
        assert_eq!(params, vec![json!("ACTIVE"), json!(3)]);
    }

    #[test]
    fn placeholders_continue_from_starting_index() {
        let (sql, params) = FilterWhere::generate(&json!({"$or": [{"a": 1}, {"b": 2}]}), 2).unwrap();
        assert_eq!(sql, "((\"a\" = $3) OR (\"b\" = $4))");
        assert_eq!(params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn json_object_values_compare_by_equality() {
        let (sql, params) = FilterWhere::generate(&json!({"config": {"key": "v"}}), 0).unwrap();
        assert_eq!(sql, "\"config\" = $1");
        assert_eq!(params, vec![json!({"key": "v"})]);
    }

    fn cast_ids(column: &str) -> Option<&'static str> {
        match column {
            "id" | "tenant_id" => Some("uuid"),
            "started_at" => Some("timestamptz"),
            _ => None,
        }
    }

    #[test]
    fn string_params_on_typed_columns_are_cast() {
        let where_data = json!({
            "tenant_id": "8f14e45f-ceea-467f-a0e6-0f7c8f1b2a3d",
            "slug": "8f14e45f-ceea-467f-a0e6-0f7c8f1b2a3d",
            "started_at": {"$gte": "2026-10-01T00:00:00Z"},
            "id": {"$in": ["a", "b"]},
        });
        let (sql, params) = FilterWhere::generate_with_casts(&where_data, 0, Some(cast_ids)).unwrap();
        assert_eq!(
            sql,
            "\"id\" IN ($1::uuid, $2::uuid) AND \"slug\" = $3 AND \"started_at\" >= $4::timestamptz AND \"tenant_id\" = $5::uuid"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(params[2], json!("8f14e45f-ceea-467f-a0e6-0f7c8f1b2a3d"));
    }

    #[test]
    fn non_string_params_and_patterns_stay_uncast() {
        let where_data = json!({"$and": [{"id": {"$like": "8f14%"}}, {"tenant_id": null}, {"id": 7}]});
        let (sql, _) = FilterWhere::generate_with_casts(&where_data, 0, Some(cast_ids)).unwrap();
        assert_eq!(sql, "((\"id\" LIKE $1) AND (\"tenant_id\" IS NULL) AND (\"id\" = $2))");
    }

    #[test]
    fn rejects_unsafe_column_names() {
        let err = FilterWhere::generate(&json!({"name\" OR 1=1 --": "x"}), 0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({"id": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }
}
