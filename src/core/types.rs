use std::cmp::Ordering;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::query::ident::is_type_name;

pub use duckdb::types::Value;

/// Column declaration of a mutation batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub sql_type: String,   // Engine type name, e.g. BIGINT, VARCHAR
}

impl Field {
    pub fn new(name: &str, sql_type: &str) -> Self {
        Field {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
        }
    }
}

/// In-memory rows supplied by the caller for upsert.
///
/// Every row has exactly one value per field, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    fields: Vec<Field>,
    rows: Vec<Vec<Value>>,
}

impl Batch {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::configuration("batch must declare at least one field"));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !is_type_name(&field.sql_type) {
                return Err(Error::configuration(format!(
                    "invalid type '{}' for field '{}'",
                    field.sql_type, field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate field '{}' in batch",
                    field.name
                )));
            }
        }
        Ok(Batch { fields, rows: Vec::new() })
    }

    pub fn with_rows(fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut batch = Batch::new(fields)?;
        for row in rows {
            batch.push_row(row)?;
        }
        Ok(batch)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(Error::schema(format!(
                "row has {} values, batch declares {} fields",
                row.len(),
                self.fields.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Build a batch from a read result, inferring each column's type from
    /// its first non-null value.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let fields = frame
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let sql_type = frame
                    .rows
                    .iter()
                    .find_map(|row| sql_type_of(&row[i]))
                    .unwrap_or("VARCHAR");
                Field::new(name, sql_type)
            })
            .collect();
        Batch::with_rows(fields, frame.rows.clone())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Engine type name for a value, None for NULL.
pub fn sql_type_of(value: &Value) -> Option<&'static str> {
    let ty = match value {
        Value::Null => return None,
        Value::Boolean(_) => "BOOLEAN",
        Value::TinyInt(_) => "TINYINT",
        Value::SmallInt(_) => "SMALLINT",
        Value::Int(_) => "INTEGER",
        Value::BigInt(_) => "BIGINT",
        Value::HugeInt(_) => "HUGEINT",
        Value::UTinyInt(_) => "UTINYINT",
        Value::USmallInt(_) => "USMALLINT",
        Value::UInt(_) => "UINTEGER",
        Value::UBigInt(_) => "UBIGINT",
        Value::Float(_) => "FLOAT",
        Value::Double(_) => "DOUBLE",
        Value::Timestamp(..) => "TIMESTAMP",
        Value::Date32(_) => "DATE",
        Value::Time64(..) => "TIME",
        Value::Blob(_) => "BLOB",
        _ => "VARCHAR",
    };
    Some(ty)
}

/// Rows returned by a read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Frame { columns, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rows as an array of JSON objects keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.clone(), value_to_json(value)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::TinyInt(v) => Json::from(*v),
        Value::SmallInt(v) => Json::from(*v),
        Value::Int(v) => Json::from(*v),
        Value::BigInt(v) => Json::from(*v),
        Value::UTinyInt(v) => Json::from(*v),
        Value::USmallInt(v) => Json::from(*v),
        Value::UInt(v) => Json::from(*v),
        Value::UBigInt(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v as f64).map_or(Json::Null, Json::Number),
        Value::Double(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        other => Json::String(render_value(other)),
    }
}

/// Numeric view of a value, if it has one.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::TinyInt(v) => Some(*v as f64),
        Value::SmallInt(v) => Some(*v as f64),
        Value::Int(v) => Some(*v as f64),
        Value::BigInt(v) => Some(*v as f64),
        Value::HugeInt(v) => Some(*v as f64),
        Value::UTinyInt(v) => Some(*v as f64),
        Value::USmallInt(v) => Some(*v as f64),
        Value::UInt(v) => Some(*v as f64),
        Value::UBigInt(v) => Some(*v as f64),
        Value::Float(v) => Some(*v as f64),
        Value::Double(v) => Some(*v),
        _ => None,
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(v) => Some(*v as i64),
        Value::SmallInt(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::BigInt(v) => Some(*v),
        Value::UTinyInt(v) => Some(*v as i64),
        Value::USmallInt(v) => Some(*v as i64),
        Value::UInt(v) => Some(*v as i64),
        Value::HugeInt(v) => i64::try_from(*v).ok(),
        Value::UBigInt(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

/// Display form used for pivot column names and JSON fallbacks.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Text(s) => s.clone(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        other => match value_as_i64(other) {
            Some(v) => v.to_string(),
            None => format!("{:?}", other),
        },
    }
}

/// Total order over values: NULL first, numbers numerically, then text,
/// then everything else by display form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        _ => match (value_as_f64(a), value_as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => render_value(a).cmp(&render_value(b)),
        },
    }
}

/// Value assigned to a column by update: bound as a parameter, or
/// interpolated as a SQL expression chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Literal(Value),
    Expression(String),
}

impl SetValue {
    pub fn literal(value: Value) -> Self {
        SetValue::Literal(value)
    }

    pub fn expr(sql: &str) -> Self {
        SetValue::Expression(sql.to_string())
    }
}
