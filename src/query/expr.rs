use std::collections::BTreeMap;
use crate::core::error::{Error, Result};
use crate::core::types::{SetValue, Value};
use crate::query::ident::quote_ident;

/// Condition shared by every assigned column of one update.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One output column of an update projection.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    Passthrough(String),
    Assign {
        column: String,
        value: SetValue,
        condition: Option<Condition>,
    },
}

impl ColumnExpr {
    /// Render as a projection item, appending bound values in the order
    /// their placeholders appear.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            ColumnExpr::Passthrough(column) => quote_ident(column),
            ColumnExpr::Assign { column, value, condition } => {
                let ident = quote_ident(column);
                let new_value = match value {
                    SetValue::Expression(sql) => format!("({})", sql),
                    SetValue::Literal(_) => "(?)".to_string(),
                };
                let expr = match condition {
                    Some(cond) => {
                        params.extend(cond.params.iter().cloned());
                        format!("CASE WHEN ({}) THEN {} ELSE {} END AS {}", cond.sql, new_value, ident, ident)
                    }
                    None => format!("{} AS {}", new_value, ident),
                };
                if let SetValue::Literal(v) = value {
                    params.push(v.clone());
                }
                expr
            }
        }
    }
}

/// Row-level `UPDATE ... SET` expressed as a full projection over the
/// dataset's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProjection {
    pub exprs: Vec<ColumnExpr>,
}

impl UpdateProjection {
    /// `columns` is the dataset's declared column order; every target in
    /// `set` must be one of them.
    pub fn build(
        columns: &[String],
        set: &BTreeMap<String, SetValue>,
        where_clause: Option<&str>,
        params: &[Value],
    ) -> Result<Self> {
        if set.is_empty() {
            return Err(Error::configuration("update requires at least one assignment"));
        }
        if let Some(missing) = set.keys().find(|c| !columns.contains(c)) {
            return Err(Error::schema(format!("update target '{}' is not a dataset column", missing)));
        }
        let condition = where_clause.map(|sql| Condition {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let exprs = columns
            .iter()
            .map(|column| match set.get(column) {
                Some(value) => ColumnExpr::Assign {
                    column: column.clone(),
                    value: value.clone(),
                    condition: condition.clone(),
                },
                None => ColumnExpr::Passthrough(column.clone()),
            })
            .collect();
        Ok(UpdateProjection { exprs })
    }

    /// SELECT text and its bound values.
    pub fn to_sql(&self, view: &str) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let items = self
            .exprs
            .iter()
            .map(|e| e.render(&mut params))
            .collect::<Vec<_>>();
        let sql = format!("SELECT {} FROM {}", items.join(", "), quote_ident(view));
        (sql, params)
    }
}
