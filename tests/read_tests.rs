mod common;

use common::*;
use duckpq::storage::file_lock::FileLock;
use duckpq::{Aggregate, Config, Dataset, EnginePivot, ErrorKind, LocalPivot, SelectQuery, Value};

fn seeded_sales(fx: &Fixture) -> Dataset {
    let ds = fx.open();
    ds.upsert(
        &sales(&[
            (1, "EU", 2023, 10.0),
            (2, "EU", 2024, 20.0),
            (3, "US", 2023, 30.0),
            (4, "US", 2024, 40.0),
            (5, "US", 2024, 2.0),
        ]),
        &["id"],
        None,
    )
    .unwrap();
    ds
}

#[test]
fn empty_dataset_reads() {
    let fx = Fixture::new("fresh");
    let ds = fx.open();
    assert!(fx.root.is_dir());
    assert_eq!(ds.count(None, &[]).unwrap(), 0);
    assert_eq!(ds.schema().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(ds.select(&SelectQuery::new()).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(ds.partition_columns().unwrap().is_empty());
    assert!(ds.manifest().unwrap().is_empty());
    assert_eq!(ds.to_string(), format!("DuckPQ@{}(Columns=[])", ds.path().display()));
}

#[test]
fn schema_reports_types() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let schema = ds.schema().unwrap();
    let types: Vec<(&str, &str)> = schema
        .iter()
        .map(|c| (c.name.as_str(), c.data_type.as_str()))
        .collect();
    assert_eq!(
        types,
        vec![("id", "BIGINT"), ("region", "VARCHAR"), ("year", "BIGINT"), ("amount", "DOUBLE")]
    );
    assert_eq!(
        ds.to_string(),
        format!("DuckPQ@{}(Columns=[\"id\", \"region\", \"year\", \"amount\"])", ds.path().display())
    );
}

#[test]
fn select_filters_orders_and_limits() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let frame = ds
        .select(
            &SelectQuery::new()
                .columns(&["id", "amount"])
                .filter("region = ? AND amount > ?", vec![text("US"), Value::Double(5.0)])
                .order_by_desc("amount")
                .limit(1),
        )
        .unwrap();
    assert_eq!(frame.columns, vec!["id", "amount"]);
    assert_eq!(frame.rows, vec![vec![Value::BigInt(4), Value::Double(40.0)]]);
}

#[test]
fn select_groups_with_expressions() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let frame = ds
        .select(
            &SelectQuery::new()
                .expressions(&["region", "sum(amount) AS total"])
                .group_by(&["region"])
                .having("count(*) > 2")
                .order_by("region"),
        )
        .unwrap();
    assert_eq!(frame.rows, vec![vec![text("US"), Value::Double(72.0)]]);
}

#[test]
fn count_binds_parameters() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    assert_eq!(ds.count(None, &[]).unwrap(), 5);
    assert_eq!(ds.count(Some("year = ?"), &[Value::BigInt(2024)]).unwrap(), 3);
}

#[test]
fn engine_pivot_spreads_values() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let pivot = EnginePivot::new(&["region"], "year", "amount")
        .aggfunc("sum")
        .on_in(vec![Value::BigInt(2023), Value::BigInt(2024)])
        .order_by(&["region"]);
    let frame = ds.pivot_engine(&pivot).unwrap();

    assert_eq!(frame.columns, vec!["region", "2023", "2024"]);
    assert_eq!(
        frame.rows,
        vec![
            vec![text("EU"), Value::Double(10.0), Value::Double(20.0)],
            vec![text("US"), Value::Double(30.0), Value::Double(42.0)],
        ]
    );
}

#[test]
fn engine_pivot_fills_missing_cells() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let pivot = EnginePivot::new(&["region"], "year", "amount")
        .aggfunc("max")
        .filter("NOT (region = 'EU' AND year = 2024)", Vec::new())
        .on_in(vec![Value::BigInt(2023), Value::BigInt(2024)])
        .order_by(&["region"])
        .fill_value(Value::Double(0.0));
    let frame = ds.pivot_engine(&pivot).unwrap();
    assert_eq!(frame.value(0, "2024"), Some(&Value::Double(0.0)));
    assert_eq!(frame.value(1, "2024"), Some(&Value::Double(40.0)));
}

#[test]
fn engine_pivot_rejects_unsafe_aggregate() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let pivot = EnginePivot::new(&["region"], "year", "amount").aggfunc("sum); DROP VIEW sales; --");
    assert_eq!(ds.pivot_engine(&pivot).unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(ds.count(None, &[]).unwrap(), 5);
}

#[test]
fn local_pivot_supports_custom_aggregates() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let spread = Aggregate::custom(|values| {
        let nums: Vec<f64> = values
            .iter()
            .filter_map(|v| match v {
                Value::Double(d) => Some(*d),
                _ => None,
            })
            .collect();
        let max = nums.iter().cloned().fold(f64::MIN, f64::max);
        let min = nums.iter().cloned().fold(f64::MAX, f64::min);
        Value::Double(max - min)
    });
    let pivot = LocalPivot::new(&["region"], &["year"], &["amount"]).aggregate(spread);
    let frame = ds.pivot_local(&pivot).unwrap();

    assert_eq!(frame.columns, vec!["region", "2023", "2024"]);
    assert_eq!(frame.value(1, "2024"), Some(&Value::Double(38.0)));
    assert_eq!(frame.value(0, "2023"), Some(&Value::Double(0.0)));
}

#[test]
fn local_pivot_mean_and_fill() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let pivot = LocalPivot::new(&["year"], &["region"], &["amount"])
        .filter("id <> ?", vec![Value::BigInt(1)])
        .fill_value(Value::Double(-1.0));
    let frame = ds.pivot_local(&pivot).unwrap();

    assert_eq!(frame.columns, vec!["year", "EU", "US"]);
    assert_eq!(
        frame.rows,
        vec![
            vec![Value::BigInt(2023), Value::Double(-1.0), Value::Double(30.0)],
            vec![Value::BigInt(2024), Value::Double(20.0), Value::Double(21.0)],
        ]
    );
}

#[test]
fn raw_query_and_execute_share_the_connection() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    ds.execute("CREATE TEMP TABLE notes (id BIGINT, body VARCHAR)", &[]).unwrap();
    ds.execute("INSERT INTO notes VALUES (?, ?)", &[Value::BigInt(4), text("big")])
        .unwrap();

    let frame = ds
        .raw_query(
            "SELECT s.amount, n.body FROM sales AS s JOIN notes AS n USING (id)",
            &[],
        )
        .unwrap();
    assert_eq!(frame.rows, vec![vec![Value::Double(40.0), text("big")]]);
}

#[test]
fn custom_view_name_is_used() {
    let fx = Fixture::new("sales");
    let ds = Dataset::open_with_config(&fx.root, Config::default().with_name("facts")).unwrap();
    ds.upsert(&sales(&[(1, "EU", 2024, 1.0)]), &["id"], None).unwrap();
    assert_eq!(ds.view_name(), "facts");
    let frame = ds.raw_query("SELECT count(*) FROM facts", &[]).unwrap();
    assert_eq!(frame.rows, vec![vec![Value::BigInt(1)]]);
}

#[test]
fn reopening_sees_existing_files() {
    let fx = Fixture::new("sales");
    {
        let ds = seeded_sales(&fx);
        ds.close().unwrap();
    }
    let ds = fx.open();
    assert!(ds.is_populated());
    assert_eq!(ds.count(None, &[]).unwrap(), 5);
}

#[test]
fn closed_dataset_rejects_every_call() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    ds.close().unwrap();
    assert!(ds.is_closed());

    assert_eq!(ds.count(None, &[]).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(ds.select(&SelectQuery::new()).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        ds.upsert(&sales(&[(9, "EU", 2024, 1.0)]), &["id"], None).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(ds.delete("id = 1", None, &[]).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(ds.close().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn held_writer_lock_rejects_mutations() {
    let fx = Fixture::new("sales");
    let ds = seeded_sales(&fx);
    let before = ds.manifest().unwrap();

    let guard = FileLock::acquire(&ds.layout().lock_path()).unwrap();
    let err = ds.delete("id = 1", None, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);
    assert_eq!(ds.manifest().unwrap(), before);

    drop(guard);
    ds.delete("id = 1", None, &[]).unwrap();
    assert_eq!(ds.count(None, &[]).unwrap(), 4);
}

#[test]
fn lock_can_be_disabled() {
    let fx = Fixture::new("sales");
    let ds = Dataset::open_with_config(&fx.root, Config::default().with_lock_writes(false)).unwrap();
    ds.upsert(&sales(&[(1, "EU", 2024, 1.0)]), &["id"], None).unwrap();

    let _guard = FileLock::acquire(&ds.layout().lock_path()).unwrap();
    ds.delete("id = 1", None, &[]).unwrap();
    assert_eq!(ds.count(None, &[]).unwrap(), 0);
}

#[test]
fn file_in_place_of_directory_is_rejected() {
    let fx = Fixture::new("plain");
    std::fs::write(&fx.root, b"not a directory").unwrap();
    let err = Dataset::open(&fx.root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
