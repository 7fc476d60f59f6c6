use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::core::types::{compare_values, render_value, value_as_f64, value_as_i64, Frame, Value};
use crate::query::builder::{OrderBy, SelectQuery};

/// Aggregation applied to the non-null values of one pivot cell.
#[derive(Clone)]
pub enum Aggregate {
    First,
    Last,
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Custom(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>),
}

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Aggregate::First => write!(f, "First"),
            Aggregate::Last => write!(f, "Last"),
            Aggregate::Sum => write!(f, "Sum"),
            Aggregate::Mean => write!(f, "Mean"),
            Aggregate::Min => write!(f, "Min"),
            Aggregate::Max => write!(f, "Max"),
            Aggregate::Count => write!(f, "Count"),
            Aggregate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Aggregate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Aggregate::Custom(Arc::new(f))
    }

    pub fn apply(&self, values: &[Value]) -> Value {
        match self {
            Aggregate::First => values.first().cloned().unwrap_or(Value::Null),
            Aggregate::Last => values.last().cloned().unwrap_or(Value::Null),
            Aggregate::Count => Value::BigInt(values.len() as i64),
            Aggregate::Min => values
                .iter()
                .min_by(|a, b| compare_values(a, b))
                .cloned()
                .unwrap_or(Value::Null),
            Aggregate::Max => values
                .iter()
                .max_by(|a, b| compare_values(a, b))
                .cloned()
                .unwrap_or(Value::Null),
            Aggregate::Sum => {
                if values.is_empty() {
                    return Value::Null;
                }
                // Integer inputs stay integer unless the sum overflows
                let total = values
                    .iter()
                    .try_fold(0i64, |acc, v| value_as_i64(v).and_then(|n| acc.checked_add(n)));
                match total {
                    Some(total) => Value::BigInt(total),
                    None => Value::Double(values.iter().filter_map(value_as_f64).sum()),
                }
            }
            Aggregate::Mean => {
                let nums: Vec<f64> = values.iter().filter_map(value_as_f64).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::Double(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            Aggregate::Custom(f) => f(values),
        }
    }
}

/// Wide reshape done in memory after fetching only the needed columns.
#[derive(Debug, Clone)]
pub struct LocalPivot {
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<String>,  // Empty: every column not in index/columns
    pub aggregate: Aggregate,
    pub where_clause: Option<String>,
    pub params: Vec<Value>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub fill_value: Option<Value>,
    pub dropna: bool,
}

impl LocalPivot {
    pub fn new<S: AsRef<str>>(index: &[S], columns: &[S], values: &[S]) -> Self {
        let owned = |s: &[S]| s.iter().map(|c| c.as_ref().to_string()).collect::<Vec<_>>();
        LocalPivot {
            index: owned(index),
            columns: owned(columns),
            values: owned(values),
            aggregate: Aggregate::Mean,
            where_clause: None,
            params: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            fill_value: None,
            dropna: true,
        }
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn filter(mut self, where_clause: &str, params: Vec<Value>) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self.params = params;
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push(column.to_string());
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

    pub fn keep_empty_columns(mut self) -> Self {
        self.dropna = false;
        self
    }

    /// Query fetching the pivot's input, columns deduplicated in order.
    pub fn source_query(&self) -> SelectQuery {
        let mut query = SelectQuery::new();
        if !self.values.is_empty() {
            let mut cols: Vec<String> = Vec::new();
            for c in self.index.iter().chain(&self.columns).chain(&self.values) {
                if !cols.contains(c) {
                    cols.push(c.clone());
                }
            }
            query = query.columns(&cols);
        }
        query.where_clause = self.where_clause.clone();
        query.params = self.params.clone();
        query.order_by = self
            .order_by
            .iter()
            .map(|c| OrderBy { column: c.clone(), descending: false })
            .collect();
        query.limit = self.limit;
        query
    }

    /// Reshape `frame` (the result of `source_query`). Output rows are
    /// sorted by index, wide columns by their key.
    pub fn apply(&self, frame: &Frame) -> Result<Frame> {
        if self.index.is_empty() || self.columns.is_empty() {
            return Err(Error::configuration("pivot requires index and columns"));
        }
        let lookup = |name: &String| {
            frame
                .column_index(name)
                .ok_or_else(|| Error::schema(format!("pivot column '{}' not in result", name)))
        };
        let index_idx = self.index.iter().map(lookup).collect::<Result<Vec<_>>>()?;
        let column_idx = self.columns.iter().map(lookup).collect::<Result<Vec<_>>>()?;
        let value_names: Vec<String> = if self.values.is_empty() {
            frame
                .columns
                .iter()
                .filter(|c| !self.index.contains(c) && !self.columns.contains(c))
                .cloned()
                .collect()
        } else {
            self.values.clone()
        };
        let value_idx = value_names.iter().map(lookup).collect::<Result<Vec<_>>>()?;

        // Distinct index keys and column keys, each sorted
        let mut row_keys: Vec<Vec<Value>> = Vec::new();
        let mut col_keys: Vec<Vec<Value>> = Vec::new();
        for row in &frame.rows {
            let rk: Vec<Value> = index_idx.iter().map(|&i| row[i].clone()).collect();
            if !row_keys.contains(&rk) {
                row_keys.push(rk);
            }
            let ck: Vec<Value> = column_idx.iter().map(|&i| row[i].clone()).collect();
            if !col_keys.contains(&ck) {
                col_keys.push(ck);
            }
        }
        row_keys.sort_by(|a, b| compare_keys(a, b));
        col_keys.sort_by(|a, b| compare_keys(a, b));

        // cells[row][value][col] collects the non-null inputs
        let mut cells = vec![vec![vec![Vec::<Value>::new(); col_keys.len()]; value_idx.len()]; row_keys.len()];
        for row in &frame.rows {
            let rk: Vec<Value> = index_idx.iter().map(|&i| row[i].clone()).collect();
            let ck: Vec<Value> = column_idx.iter().map(|&i| row[i].clone()).collect();
            let (Some(r), Some(c)) = (
                row_keys.iter().position(|k| *k == rk),
                col_keys.iter().position(|k| *k == ck),
            ) else {
                continue;
            };
            for (v, &vi) in value_idx.iter().enumerate() {
                if row[vi] != Value::Null {
                    cells[r][v][c].push(row[vi].clone());
                }
            }
        }

        let mut wide_names = Vec::new();
        let mut wide_values: Vec<Vec<Value>> = vec![Vec::new(); row_keys.len()];
        for (v, value_name) in value_names.iter().enumerate() {
            for (c, ck) in col_keys.iter().enumerate() {
                let column: Vec<Value> = (0..row_keys.len())
                    .map(|r| {
                        if cells[r][v][c].is_empty() {
                            Value::Null
                        } else {
                            self.aggregate.apply(&cells[r][v][c])
                        }
                    })
                    .collect();
                if self.dropna && column.iter().all(|x| *x == Value::Null) {
                    continue;
                }
                let key = ck.iter().map(render_value).collect::<Vec<_>>().join("_");
                wide_names.push(if value_names.len() > 1 {
                    format!("{}_{}", value_name, key)
                } else {
                    key
                });
                for (r, cell) in column.into_iter().enumerate() {
                    let cell = match (&cell, &self.fill_value) {
                        (Value::Null, Some(fill)) => fill.clone(),
                        _ => cell,
                    };
                    wide_values[r].push(cell);
                }
            }
        }

        let mut out = Frame::new(self.index.iter().cloned().chain(wide_names).collect());
        for (rk, wide) in row_keys.into_iter().zip(wide_values) {
            out.rows.push(rk.into_iter().chain(wide).collect());
        }
        Ok(out)
    }
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_values(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
