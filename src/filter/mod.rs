//! Document filters shared by every store backend.
//!
//! A filter is a conjunction of per-field conditions. `$in` with an empty
//! list matches nothing, which is what tenant narrowing relies on when a
//! school has no classrooms yet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")]
    Eq(Value),
    #[serde(rename = "$in")]
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterWhereInfo {
    pub field: String,
    pub op: FilterOp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Vec<FilterWhereInfo>,
}

/// Positional parameter of a rendered filter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(Value),
}

/// SQL fragment plus its positional parameters.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(FilterWhereInfo {
            field: field.into(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(FilterWhereInfo {
            field: field.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|cond| {
            let actual = doc.get(&cond.field).unwrap_or(&Value::Null);
            match &cond.op {
                FilterOp::Eq(expected) => actual == expected,
                FilterOp::In(values) => values.iter().any(|v| v == actual),
            }
        })
    }

    /// Render as a predicate over a JSONB `data` column. Values are compared
    /// as JSONB so numbers and strings keep their types. Parameter numbering
    /// starts after `offset` already-bound parameters.
    pub fn to_sql(&self, offset: usize) -> SqlResult {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut params = Vec::new();

        for cond in &self.conditions {
            match &cond.op {
                FilterOp::Eq(value) => {
                    params.push(SqlParam::Text(cond.field.clone()));
                    let field_idx = offset + params.len();
                    params.push(SqlParam::Json(value.clone()));
                    let value_idx = offset + params.len();
                    clauses.push(format!("data -> ${} = ${}::jsonb", field_idx, value_idx));
                }
                FilterOp::In(values) if values.is_empty() => {
                    clauses.push("FALSE".to_string());
                }
                FilterOp::In(values) => {
                    params.push(SqlParam::Text(cond.field.clone()));
                    let field_idx = offset + params.len();
                    params.push(SqlParam::Json(Value::Array(values.clone())));
                    let value_idx = offset + params.len();
                    clauses.push(format!(
                        "data -> ${} IN (SELECT jsonb_array_elements(${}::jsonb))",
                        field_idx, value_idx
                    ));
                }
            }
        }

        let query = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };
        SqlResult { query, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&doc(json!({"a": 1}))));
        assert_eq!(Filter::all().to_sql(0).query, "TRUE");
    }

    #[test]
    fn eq_and_in_are_conjunctive() {
        let filter = Filter::all()
            .eq("schoolId", "s1")
            .any_of("name", ["a", "b"]);
        assert!(filter.matches(&doc(json!({"schoolId": "s1", "name": "a"}))));
        assert!(!filter.matches(&doc(json!({"schoolId": "s2", "name": "a"}))));
        assert!(!filter.matches(&doc(json!({"schoolId": "s1", "name": "c"}))));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let filter = Filter::all().any_of("classroomId", Vec::<String>::new());
        assert!(!filter.matches(&doc(json!({"classroomId": "c1"}))));
        assert_eq!(filter.to_sql(0).query, "FALSE");
    }

    #[test]
    fn missing_field_only_matches_null() {
        let filter = Filter::all().eq("schoolId", "s1");
        assert!(!filter.matches(&doc(json!({}))));
    }

    #[test]
    fn sql_parameters_are_numbered_after_offset() {
        let sql = Filter::all().eq("schoolId", "s1").any_of("name", ["x"]).to_sql(1);
        assert_eq!(
            sql.query,
            "data -> $2 = $3::jsonb AND data -> $4 IN (SELECT jsonb_array_elements($5::jsonb))"
        );
        assert_eq!(sql.params.len(), 4);
        assert_eq!(sql.params[0], SqlParam::Text("schoolId".into()));
        assert_eq!(sql.params[1], SqlParam::Json(json!("s1")));
    }
}
