use serde_json::Value;

use super::{validate_collection, StoreResult};
use crate::query::{FilterOp, QuerySpec, SortDirection};

/// A bound parameter. Field paths travel as `text[]` and values as `jsonb`;
/// nothing from the request is ever spliced into the statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Path(Vec<String>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Renders a `QuerySpec` against a `(id uuid, doc jsonb)` collection table
pub struct SqlBuilder {
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    pub fn select(collection: &str, spec: &QuerySpec) -> StoreResult<SqlResult> {
        validate_collection(collection)?;
        let mut builder = Self { params: vec![] };

        let where_clause = builder.where_clause(spec);
        let order_clause = builder.order_clause(spec);

        let query = [
            format!("SELECT doc FROM {}", quote_identifier(collection)),
            where_clause,
            order_clause,
            format!("LIMIT {} OFFSET {}", spec.limit(), spec.skip()),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: builder.params })
    }

    fn where_clause(&mut self, spec: &QuerySpec) -> String {
        let mut conditions = vec![];
        for (field, op, value) in spec.filter().terms() {
            let path = self.param(SqlParam::Path(split_path(field)));
            let value = self.param(SqlParam::Json(value.clone()));
            let condition = match op {
                // Containment gives array-element matching for free
                FilterOp::Eq => format!("doc #> {path} @> {value}"),
                // Absent and null paths count as different
                FilterOp::Ne => format!("NOT COALESCE(doc #> {path} @> {value}, false)"),
                _ => format!(
                    "(jsonb_typeof(doc #> {path}) = jsonb_typeof({value}) AND doc #> {path} {} {value})",
                    op.to_sql()
                ),
            };
            conditions.push(condition);
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        }
    }

    fn order_clause(&mut self, spec: &QuerySpec) -> String {
        if spec.sort().is_empty() {
            return String::new();
        }
        let parts: Vec<String> = spec
            .sort()
            .iter()
            .map(|s| {
                let path = self.param(SqlParam::Path(split_path(&s.field)));
                let nulls = match s.direction {
                    SortDirection::Asc => "NULLS FIRST",
                    SortDirection::Desc => "NULLS LAST",
                };
                format!("doc #> {path} {} {nulls}", s.direction.to_sql())
            })
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }

    fn param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        let index = self.params.len();
        match self.params[index - 1] {
            SqlParam::Path(_) => format!("${}::text[]", index),
            SqlParam::Json(_) => format!("${}::jsonb", index),
        }
    }
}

fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
