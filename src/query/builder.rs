use std::path::Path;
use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::query::ident::{is_identifier, quote_ident, quote_list};

/// Hidden columns used by the deduplication query.
pub const IS_NEW_COLUMN: &str = "__duckpq_is_new";
pub const ORDINAL_COLUMN: &str = "__duckpq_ord";
pub const RANK_COLUMN: &str = "__duckpq_rn";

/// Data file name for an unpartitioned write.
pub const DATA_FILE: &str = "data_0.parquet";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),       // Identifiers, quoted on render
    Expressions(Vec<String>),   // Raw SQL, e.g. "count(*) AS n"
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Structured SELECT against the dataset view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub projection: Projection,
    pub where_clause: Option<String>,
    pub params: Vec<Value>,
    pub group_by: Vec<String>,
    pub having: Option<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
}

impl SelectQuery {
    pub fn new() -> Self {
        SelectQuery::default()
    }

    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.projection = Projection::Columns(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn expressions<S: AsRef<str>>(mut self, exprs: &[S]) -> Self {
        self.projection = Projection::Expressions(exprs.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn filter(mut self, where_clause: &str, params: Vec<Value>) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self.params = params;
        self
    }

    pub fn group_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.group_by = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn having(mut self, condition: &str) -> Self {
        self.having = Some(condition.to_string());
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push(OrderBy { column: column.to_string(), descending: false });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push(OrderBy { column: column.to_string(), descending: true });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn to_sql(&self, view: &str) -> String {
        let mut sql = vec!["SELECT".to_string()];
        if self.distinct {
            sql.push("DISTINCT".to_string());
        }
        sql.push(match &self.projection {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => quote_list(cols),
            Projection::Expressions(exprs) => exprs.join(", "),
        });
        sql.push(format!("FROM {}", quote_ident(view)));
        if let Some(where_clause) = &self.where_clause {
            sql.push(format!("WHERE {}", where_clause));
        }
        if !self.group_by.is_empty() {
            sql.push(format!("GROUP BY {}", quote_list(&self.group_by)));
        }
        if let Some(having) = &self.having {
            sql.push(format!("HAVING {}", having));
        }
        if !self.order_by.is_empty() {
            sql.push(format!("ORDER BY {}", order_list(&self.order_by)));
        }
        if let Some(limit) = self.limit {
            sql.push(format!("LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push(format!("OFFSET {}", offset));
        }
        sql.join(" ")
    }
}

fn order_list(order_by: &[OrderBy]) -> String {
    order_by
        .iter()
        .map(|o| {
            if o.descending {
                format!("{} DESC", quote_ident(&o.column))
            } else {
                quote_ident(&o.column)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn count_sql(view: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!("SELECT COUNT(*) AS c FROM {}", quote_ident(view));
    if let Some(where_clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

pub fn describe_sql(view: &str) -> String {
    format!("DESCRIBE {}", quote_ident(view))
}

pub fn create_view_sql(view: &str, scan_pattern: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {} AS SELECT * FROM parquet_scan({}, hive_partitioning = true)",
        quote_ident(view),
        string_literal(scan_pattern)
    )
}

pub fn drop_view_sql(view: &str) -> String {
    format!("DROP VIEW IF EXISTS {}", quote_ident(view))
}

/// `COPY (select) TO 'target' (...)`. Unpartitioned writes target a file,
/// partitioned writes target a directory.
pub fn copy_sql(select_sql: &str, target: &Path, compression: &str, partition_by: &[String]) -> String {
    let mut options = vec!["FORMAT 'parquet'".to_string()];
    if !compression.is_empty() {
        options.push(format!("COMPRESSION '{}'", compression));
    }
    if !partition_by.is_empty() {
        options.push(format!("PARTITION_BY ({})", quote_list(partition_by)));
    }
    format!(
        "COPY ({}) TO {} ({})",
        select_sql,
        string_literal(&target.to_string_lossy()),
        options.join(", ")
    )
}

pub fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// SQL literal for a scalar; used where the dialect does not accept a
/// bound parameter (PIVOT ... IN lists).
pub fn value_literal(value: &Value) -> Result<String> {
    let literal = match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Value::TinyInt(v) => v.to_string(),
        Value::SmallInt(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::HugeInt(v) => v.to_string(),
        Value::UTinyInt(v) => v.to_string(),
        Value::USmallInt(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::UBigInt(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => v.to_string(),
        Value::Double(v) if v.is_finite() => v.to_string(),
        Value::Text(s) => string_literal(s),
        other => {
            return Err(Error::configuration(format!(
                "value {:?} cannot be rendered as a SQL literal",
                other
            )))
        }
    };
    Ok(literal)
}

/// Rows already in the dataset that compete with the batch.
#[derive(Debug, Clone, Copy)]
pub enum ExistingScope<'a> {
    None,
    Whole { view: &'a str },
    /// Only partitions whose key values occur in the batch. NULL partition
    /// values match each other.
    Partitions { view: &'a str, partition_by: &'a [String] },
}

/// Batch columns in dataset order. With `types`, each column is cast to
/// the dataset's type so rewritten files keep the dataset schema.
fn batch_projection(columns: &[String], types: &[String]) -> String {
    if types.is_empty() {
        return quote_list(columns);
    }
    columns
        .iter()
        .zip(types)
        .map(|(c, ty)| {
            let ident = quote_ident(c);
            format!("CAST({} AS {}) AS {}", ident, ty, ident)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Last-write-wins deduplication: existing rows rank below batch rows,
/// and later batch rows rank above earlier ones with the same key.
///
/// `types` runs parallel to `columns`; empty means no cast.
pub fn dedup_sql(
    columns: &[String],
    types: &[String],
    keys: &[String],
    existing: ExistingScope<'_>,
    batch_table: &str,
) -> String {
    let all_cols = quote_list(columns);
    let key_expr = quote_list(keys);
    let batch_ident = quote_ident(batch_table);
    let incoming = format!(
        "SELECT {batch_cols}, 1 AS {is_new}, {ord} FROM {batch_ident}",
        batch_cols = batch_projection(columns, types),
        is_new = IS_NEW_COLUMN,
        ord = ORDINAL_COLUMN,
    );
    let existing_sql = match existing {
        ExistingScope::None => None,
        ExistingScope::Whole { view } => Some(format!(
            "SELECT {all_cols}, 0 AS {is_new}, 0 AS {ord} FROM {view}",
            is_new = IS_NEW_COLUMN,
            ord = ORDINAL_COLUMN,
            view = quote_ident(view),
        )),
        ExistingScope::Partitions { view, partition_by } => {
            let part_types: Vec<String> = if types.is_empty() {
                Vec::new()
            } else {
                partition_by
                    .iter()
                    .filter_map(|p| columns.iter().position(|c| c == p).map(|i| types[i].clone()))
                    .collect()
            };
            let part_cols = if part_types.len() == partition_by.len() {
                batch_projection(partition_by, &part_types)
            } else {
                quote_list(partition_by)
            };
            let matches = partition_by
                .iter()
                .map(|c| {
                    let ident = quote_ident(c);
                    format!("e.{} IS NOT DISTINCT FROM p.{}", ident, ident)
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            Some(format!(
                "SELECT {all_cols}, 0 AS {is_new}, 0 AS {ord} FROM {view} AS e \
                 WHERE EXISTS (SELECT 1 FROM (SELECT DISTINCT {part_cols} FROM {batch_ident}) AS p WHERE {matches})",
                is_new = IS_NEW_COLUMN,
                ord = ORDINAL_COLUMN,
                view = quote_ident(view),
            ))
        }
    };
    let source = match existing_sql {
        Some(existing_sql) => format!("{} UNION ALL {}", existing_sql, incoming),
        None => incoming,
    };
    format!(
        "SELECT {all_cols} FROM (\
         SELECT *, ROW_NUMBER() OVER (PARTITION BY {key_expr} ORDER BY {is_new} DESC, {ord} DESC) AS {rn} \
         FROM ({source})\
         ) WHERE {rn} = 1",
        is_new = IS_NEW_COLUMN,
        ord = ORDINAL_COLUMN,
        rn = RANK_COLUMN,
    )
}

/// `SELECT * FROM view WHERE NOT (where)`. A row whose predicate is NULL
/// is not kept.
pub fn retain_sql(view: &str, where_clause: &str) -> String {
    format!("SELECT * FROM {} WHERE NOT ({})", quote_ident(view), where_clause)
}

/// Engine-native wide reshape.
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePivot {
    pub index: Vec<String>,
    pub columns: String,
    pub values: String,
    pub aggfunc: String,
    pub where_clause: Option<String>,
    pub params: Vec<Value>,
    pub on_in: Vec<Value>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub fill_value: Option<Value>,
}

impl EnginePivot {
    pub fn new<S: AsRef<str>>(index: &[S], columns: &str, values: &str) -> Self {
        EnginePivot {
            index: index.iter().map(|c| c.as_ref().to_string()).collect(),
            columns: columns.to_string(),
            values: values.to_string(),
            aggfunc: "first".to_string(),
            where_clause: None,
            params: Vec::new(),
            on_in: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            fill_value: None,
        }
    }

    pub fn aggfunc(mut self, name: &str) -> Self {
        self.aggfunc = name.to_string();
        self
    }

    pub fn filter(mut self, where_clause: &str, params: Vec<Value>) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self.params = params;
        self
    }

    pub fn on_in(mut self, values: Vec<Value>) -> Self {
        self.on_in = values;
        self
    }

    pub fn group_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.group_by = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn order_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.order_by = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn fill_value(mut self, value: Value) -> Self {
        self.fill_value = Some(value);
        self
    }

    pub fn to_sql(&self, view: &str) -> Result<String> {
        if self.index.is_empty() {
            return Err(Error::configuration("pivot requires at least one index column"));
        }
        // Function names cannot be bound or quoted
        if !is_identifier(&self.aggfunc) {
            return Err(Error::configuration(format!(
                "invalid pivot aggregate '{}'",
                self.aggfunc
            )));
        }

        let mut inner_cols = self.index.clone();
        inner_cols.push(self.columns.clone());
        inner_cols.push(self.values.clone());
        let mut inner = format!("SELECT {} FROM {}", quote_list(&inner_cols), quote_ident(view));
        if let Some(where_clause) = &self.where_clause {
            inner.push_str(" WHERE ");
            inner.push_str(where_clause);
        }

        let mut pivot_on = quote_ident(&self.columns);
        if !self.on_in.is_empty() {
            let literals = self
                .on_in
                .iter()
                .map(value_literal)
                .collect::<Result<Vec<_>>>()?;
            pivot_on.push_str(&format!(" IN ({})", literals.join(", ")));
        }

        let mut lines = vec![
            format!("PIVOT ({})", inner),
            format!("ON {}", pivot_on),
            format!("USING {}({})", self.aggfunc, quote_ident(&self.values)),
        ];
        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", quote_list(&self.group_by)));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", quote_list(&self.order_by)));
        }
        if let Some(limit) = self.limit {
            lines.push(format!("LIMIT {}", limit));
        }
        Ok(lines.join("\n"))
    }
}
