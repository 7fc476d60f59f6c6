mod common;

use common::*;
use duckpq::{ErrorKind, MutationKind, SetValue, Value};

fn seeded(fx: &Fixture) -> duckpq::Dataset {
    let ds = fx.open();
    ds.upsert(&products(&[(1, "a", 1.0), (2, "b", 2.0), (3, "c", 3.0)]), &["id"], None)
        .unwrap();
    ds
}

#[test]
fn update_with_condition_touches_matching_rows_only() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);

    let outcome = ds
        .update(
            &[("price", SetValue::literal(Value::Double(9.5)))],
            Some("id >= ?"),
            None,
            &[Value::BigInt(2)],
        )
        .unwrap();
    assert_eq!(outcome.kind, MutationKind::Update);
    assert_eq!(outcome.rows_written, 3);

    assert_eq!(
        column_by_id(&ds, "price"),
        vec![(1, Value::Double(1.0)), (2, Value::Double(9.5)), (3, Value::Double(9.5))]
    );
}

#[test]
fn update_without_condition_touches_every_row() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    ds.update(&[("name", SetValue::literal(text("z")))], None, None, &[]).unwrap();

    assert_eq!(
        column_by_id(&ds, "name"),
        vec![(1, text("z")), (2, text("z")), (3, text("z"))]
    );
}

#[test]
fn update_accepts_sql_expressions() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    ds.update(
        &[("price", SetValue::expr("price * 10")), ("name", SetValue::expr("upper(name)"))],
        Some("name <> ?"),
        None,
        &[text("b")],
    )
    .unwrap();

    assert_eq!(
        column_by_id(&ds, "price"),
        vec![(1, Value::Double(10.0)), (2, Value::Double(2.0)), (3, Value::Double(30.0))]
    );
    assert_eq!(
        column_by_id(&ds, "name"),
        vec![(1, text("A")), (2, text("b")), (3, text("C"))]
    );
}

#[test]
fn update_of_unknown_column_is_a_schema_error() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    let before = ds.manifest().unwrap();

    let err = ds
        .update(&[("colour", SetValue::literal(text("red")))], None, None, &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.to_string().starts_with("Schema: update "));
    assert_eq!(ds.manifest().unwrap(), before);
}

#[test]
fn failing_update_leaves_dataset_and_no_workspace() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    let before = ds.manifest().unwrap();

    let err = ds
        .update(&[("price", SetValue::expr("no_such_column + 1"))], None, None, &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);

    assert_eq!(ds.manifest().unwrap(), before);
    assert!(fx.leftover_workspaces().is_empty());
    assert_eq!(ds.count(None, &[]).unwrap(), 3);
}

#[test]
fn delete_removes_matching_rows() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    let outcome = ds.delete("id = ?", None, &[Value::BigInt(2)]).unwrap();
    assert_eq!(outcome.kind, MutationKind::Delete);
    assert_eq!(outcome.rows_written, 2);

    let ids: Vec<i64> = column_by_id(&ds, "name").into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn delete_drops_rows_where_condition_is_null() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    ds.update(&[("name", SetValue::expr("NULL"))], Some("id = 1"), None, &[])
        .unwrap();

    // NOT (NULL <> 'zzz') is NULL, so row 1 is not kept
    ds.delete("name <> 'zzz'", None, &[]).unwrap();
    assert_eq!(ds.count(None, &[]).unwrap(), 0);
}

#[test]
fn delete_keeps_only_rows_the_negated_condition_accepts() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    ds.update(&[("name", SetValue::expr("NULL"))], Some("id = 1"), None, &[])
        .unwrap();

    ds.delete("name = 'b'", None, &[]).unwrap();
    assert_eq!(column_by_id(&ds, "name"), vec![(3, text("c"))]);
}

#[test]
fn delete_requires_a_condition() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    let err = ds.delete("  ", None, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(ds.count(None, &[]).unwrap(), 3);
}

#[test]
fn deleting_everything_returns_to_empty() {
    let fx = Fixture::new("products");
    let ds = seeded(&fx);
    ds.delete("TRUE", None, &[]).unwrap();

    assert_eq!(ds.count(None, &[]).unwrap(), 0);
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn rewrites_on_empty_dataset_are_not_found() {
    let fx = Fixture::new("products");
    let ds = fx.open();

    let err = ds.delete("id = 1", None, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = ds
        .update(&[("price", SetValue::literal(Value::Double(1.0)))], None, None, &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn partitioned_rewrite_keeps_layout() {
    let fx = Fixture::new("sales");
    let ds = fx.open();
    ds.upsert(
        &sales(&[(1, "EU", 2024, 10.0), (2, "US", 2024, 20.0)]),
        &["id"],
        Some(&["region"][..]),
    )
    .unwrap();

    ds.update(
        &[("amount", SetValue::expr("amount + 1"))],
        Some("region = ?"),
        None,
        &[text("US")],
    )
    .unwrap();
    ds.delete("region = ?", None, &[text("EU")]).unwrap();

    assert_eq!(ds.partition_columns().unwrap(), vec!["region"]);
    assert_eq!(column_by_id(&ds, "amount"), vec![(2, Value::Double(21.0))]);
    let files = relative_files(&fx.root);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("region=US"));
}
