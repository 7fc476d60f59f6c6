use duckdb::Connection;
use serde::{Deserialize, Serialize};
use crate::core::engine::query_frame;
use crate::core::error::{Error, Result};
use crate::core::types::{Frame, Value};
use crate::query::builder::describe_sql;

/// Column of the dataset view as reported by DESCRIBE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Ordered column list of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub columns: Vec<ColumnInfo>,
}

impl DatasetSchema {
    /// Parse a DESCRIBE result. Falls back to the first two columns when
    /// the engine names them differently.
    pub fn from_describe(frame: &Frame) -> Result<Self> {
        let name_idx = frame
            .column_index("column_name")
            .or_else(|| frame.column_index("name"))
            .unwrap_or(0);
        let type_idx = frame
            .column_index("column_type")
            .or_else(|| frame.column_index("type"))
            .unwrap_or(1);
        let null_idx = frame.column_index("null");

        let mut columns = Vec::with_capacity(frame.len());
        for row in &frame.rows {
            let name = text_at(row, name_idx)?;
            let data_type = text_at(row, type_idx)?;
            let nullable = match null_idx {
                Some(i) => !matches!(row.get(i), Some(Value::Text(s)) if s.eq_ignore_ascii_case("NO")),
                None => true,
            };
            columns.push(ColumnInfo { name, data_type, nullable });
        }
        Ok(DatasetSchema { columns })
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Engine type names, parallel to `names()`.
    pub fn types(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.data_type.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Same column names, order ignored. Returns the offending names
    /// otherwise: (missing from `other`, unexpected in `other`).
    pub fn diff_names(&self, other: &[String]) -> (Vec<String>, Vec<String>) {
        let missing = self
            .columns
            .iter()
            .filter(|c| !other.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        let unexpected = other
            .iter()
            .filter(|n| !self.contains(n))
            .cloned()
            .collect();
        (missing, unexpected)
    }
}

/// Describe the live view. The caller guarantees the view exists.
pub fn introspect(conn: &Connection, view: &str) -> Result<DatasetSchema> {
    let frame = query_frame(conn, &describe_sql(view), &[])?;
    DatasetSchema::from_describe(&frame)
}

fn text_at(row: &[Value], idx: usize) -> Result<String> {
    match row.get(idx) {
        Some(Value::Text(s)) => Ok(s.clone()),
        other => Err(Error::schema(format!(
            "unexpected DESCRIBE cell {:?} at column {}",
            other, idx
        ))),
    }
}
