//! In-memory evaluation of parsed filters against JSON rows.
//!
//! Mirrors the SQL generated by [`super::Filter::to_sql`] closely enough for
//! the memory store: SQL NULL semantics for comparisons, RFC 3339 strings
//! compared as instants, and NULLs sorting last in ascending order.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOp, FilterWhereInfo, SortDirection, WhereNode};

pub type Row = Map<String, Value>;

/// Apply where/order/offset/limit/select to `rows`.
pub fn apply(filter: &Filter, rows: Vec<Row>) -> Result<Vec<Row>, FilterError> {
    let nodes = filter.where_nodes()?;
    let mut matched: Vec<Row> = rows.into_iter().filter(|row| matches_all(&nodes, row)).collect();

    let order = filter.order_info();
    if !order.is_empty() {
        matched.sort_by(|a, b| {
            for info in order {
                let left = a.get(&info.column).unwrap_or(&Value::Null);
                let right = b.get(&info.column).unwrap_or(&Value::Null);
                let ord = compare_for_sort(left, right);
                let ord = match info.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
    let limit = filter.limit_value().map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    let columns = filter.select_columns();
    let project = !columns.is_empty() && !columns.iter().any(|c| c == "*");

    Ok(matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| {
            if project {
                row.into_iter().filter(|(k, _)| columns.contains(k)).collect()
            } else {
                row
            }
        })
        .collect())
}

pub fn matches_all(nodes: &[WhereNode], row: &Row) -> bool {
    nodes.iter().all(|node| matches_node(node, row))
}

fn matches_node(node: &WhereNode, row: &Row) -> bool {
    match node {
        WhereNode::Condition(info) => matches_condition(info, row),
        WhereNode::And(children) => matches_all(children, row),
        WhereNode::Or(children) => children.iter().any(|child| matches_node(child, row)),
        WhereNode::Not(children) => !children.is_empty() && !matches_all(children, row),
    }
}

fn matches_condition(info: &FilterWhereInfo, row: &Row) -> bool {
    let value = row.get(&info.column).unwrap_or(&Value::Null);
    let data = &info.data;

    match info.operator {
        FilterOp::Eq if data.is_null() => value.is_null(),
        FilterOp::Eq => compare(value, data) == Some(Ordering::Equal),
        FilterOp::Ne if data.is_null() => !value.is_null(),
        // IS DISTINCT FROM
        FilterOp::Ne => value.is_null() || compare(value, data) != Some(Ordering::Equal),
        FilterOp::Gt => compare(value, data) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(value, data), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(value, data) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(value, data), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => like(value, data, false),
        FilterOp::ILike => like(value, data, true),
        FilterOp::In | FilterOp::NIn => {
            if value.is_null() {
                return false;
            }
            let found = match data {
                Value::Array(values) => values.iter().any(|v| compare(value, v) == Some(Ordering::Equal)),
                single => compare(value, single) == Some(Ordering::Equal),
            };
            found == (info.operator == FilterOp::In)
        }
        FilterOp::Between => match data.as_array() {
            Some(bounds) if bounds.len() == 2 => {
                matches!(compare(value, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(value, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
        FilterOp::Exists => data.as_bool().unwrap_or(true) != value.is_null(),
        FilterOp::Null => data.as_bool().unwrap_or(true) == value.is_null(),
    }
}

fn as_instant(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Compare two non-null JSON values. `None` means NULL or incomparable.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (as_instant(a), as_instant(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare_for_sort(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
    }
}

fn like(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(value), Some(pattern)) = (value.as_str(), pattern.as_str()) else {
        return false;
    };
    if case_insensitive {
        let value: Vec<char> = value.to_lowercase().chars().collect();
        let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
        like_match(&value, &pattern)
    } else {
        let value: Vec<char> = value.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        like_match(&value, &pattern)
    }
}

// `%` matches any run, `_` a single character.
fn like_match(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => (0..=value.len()).any(|skip| like_match(&value[skip..], rest)),
        Some(('_', rest)) => !value.is_empty() && like_match(&value[1..], rest),
        Some((c, rest)) => value.first() == Some(c) && like_match(&value[1..], rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterData;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            json!({"name": "Alpha", "count": 3, "started_at": "2024-01-02T10:00:00Z", "error": null}),
            json!({"name": "beta", "count": 10, "started_at": "2024-01-01T10:00:00+01:00", "error": "boom"}),
            json!({"name": "Gamma", "count": 7, "started_at": null, "error": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn run(data: FilterData) -> Vec<String> {
        let mut filter = Filter::new("items").unwrap();
        filter.assign(data).unwrap();
        apply(&filter, rows())
            .unwrap()
            .into_iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn numeric_comparisons_are_not_lexical() {
        assert_eq!(run(FilterData::matching(json!({"count": {"$gt": 5}})).order_by("count")), vec!["Gamma", "beta"]);
    }

    #[test]
    fn timestamps_compare_as_instants() {
        let names = run(FilterData::matching(json!({"started_at": {"$lt": "2024-01-02T00:00:00Z"}})));
        assert_eq!(names, vec!["beta"]);
    }

    #[test]
    fn null_sorts_last_ascending_and_first_descending() {
        assert_eq!(run(FilterData::default().order_by("started_at asc")), vec!["beta", "Alpha", "Gamma"]);
        assert_eq!(run(FilterData::default().order_by("started_at desc")), vec!["Gamma", "Alpha", "beta"]);
    }

    #[test]
    fn ilike_and_null_operators() {
        assert_eq!(run(FilterData::matching(json!({"name": {"$ilike": "%A"}})).order_by("name")), vec!["Alpha", "Gamma", "beta"]);
        assert_eq!(run(FilterData::matching(json!({"error": {"$null": false}}))), vec!["beta"]);
    }

    #[test]
    fn or_and_not_with_limit() {
        let where_data = json!({"$or": [{"name": "Alpha"}, {"count": 10}], "$not": {"name": "beta"}});
        assert_eq!(run(FilterData::matching(where_data)), vec!["Alpha"]);
        assert_eq!(run(FilterData::default().order_by("count desc").limit(1)), vec!["beta"]);
    }
}
