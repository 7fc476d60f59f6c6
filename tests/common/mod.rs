#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use duckpq::core::logging;
use duckpq::{Batch, Dataset, Field, SelectQuery, Value};
use tempfile::TempDir;

pub struct Fixture {
    pub tmp: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        logging::init_for_tests();
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(name);
        Fixture { tmp, root }
    }

    pub fn open(&self) -> Dataset {
        Dataset::open(&self.root).unwrap()
    }

    /// Entries beside the dataset root left behind by a mutation.
    pub fn leftover_workspaces(&self) -> Vec<String> {
        fs::read_dir(self.tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".__parquet_rewrite_"))
            .collect()
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn products(rows: &[(i64, &str, f64)]) -> Batch {
    Batch::with_rows(
        vec![
            Field::new("id", "BIGINT"),
            Field::new("name", "VARCHAR"),
            Field::new("price", "DOUBLE"),
        ],
        rows.iter()
            .map(|(id, name, price)| vec![Value::BigInt(*id), text(name), Value::Double(*price)])
            .collect(),
    )
    .unwrap()
}

pub fn sales(rows: &[(i64, &str, i64, f64)]) -> Batch {
    Batch::with_rows(
        vec![
            Field::new("id", "BIGINT"),
            Field::new("region", "VARCHAR"),
            Field::new("year", "BIGINT"),
            Field::new("amount", "DOUBLE"),
        ],
        rows.iter()
            .map(|(id, region, year, amount)| {
                vec![Value::BigInt(*id), text(region), Value::BigInt(*year), Value::Double(*amount)]
            })
            .collect(),
    )
    .unwrap()
}

/// `(id, column)` pairs ordered by id.
pub fn column_by_id(ds: &Dataset, column: &str) -> Vec<(i64, Value)> {
    let frame = ds
        .select(&SelectQuery::new().columns(&["id", column]).order_by("id"))
        .unwrap();
    frame
        .rows
        .into_iter()
        .map(|row| match &row[0] {
            Value::BigInt(id) => (*id, row[1].clone()),
            other => panic!("unexpected id {:?}", other),
        })
        .collect()
}

pub fn relative_files(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    collect(root, root, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            out.push(path.strip_prefix(root).unwrap().to_string_lossy().into_owned());
        }
    }
}
