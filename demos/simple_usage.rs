/// Complete DuckPQ API Demo
///
/// Demonstrates the mutation surface over a partitioned parquet directory:
/// - Upsert (insert-or-overwrite by key)
/// - Update and delete with bound parameters
/// - Reads, counts and pivots
/// - File manifest

use duckpq::core::logging::{self, LogConfig};
use duckpq::{Batch, Dataset, EnginePivot, Field, SelectQuery, SetValue, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&LogConfig::default())?;

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║      DuckPQ - Partitioned Parquet Demo        ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Open an empty dataset
    let tmp = tempfile::TempDir::new()?;
    let ds = Dataset::open(tmp.path().join("sales"))?;
    println!("Opened {}\n", ds);

    // Step 2: UPSERT - first write decides the layout
    println!("Step 2: UPSERT - Adding rows partitioned by region...");
    let batch = sales_batch(&[
        (1, "EU", 2023, 120.0),
        (2, "EU", 2024, 80.0),
        (3, "US", 2024, 200.0),
        (4, "APAC", 2024, 45.5),
    ])?;
    let outcome = ds.upsert(&batch, &["id"], Some(&["region"][..]))?;
    println!("  Wrote {} rows in {} ms", outcome.rows_written, outcome.elapsed_ms);
    println!("  Partition columns: {:?}\n", ds.partition_columns()?);

    // Step 3: UPSERT again - overwrite id 2, add id 5; only EU is rewritten
    println!("Step 3: UPSERT - Overwriting one key...");
    let outcome = ds.upsert(&sales_batch(&[(2, "EU", 2024, 95.0), (5, "EU", 2024, 10.0)])?, &["id"], None)?;
    println!("  Replaced {} partition(s)", outcome.partitions_replaced);
    println!("  Rows now: {}\n", ds.count(None, &[])?);

    // Step 4: UPDATE - conditional, with parameters
    println!("Step 4: UPDATE - 10% uplift for 2024...");
    ds.update(
        &[("amount", SetValue::expr("amount * 1.1"))],
        Some("year = ?"),
        None,
        &[Value::BigInt(2024)],
    )?;

    // Step 5: DELETE
    println!("Step 5: DELETE - Removing small orders...");
    ds.delete("amount < ?", None, &[Value::Double(20.0)])?;
    println!("  Rows now: {}\n", ds.count(None, &[])?);

    // Step 6: READ
    println!("Step 6: SELECT - Top rows by amount...");
    let frame = ds.select(&SelectQuery::new().order_by_desc("amount").limit(3))?;
    println!("  {}\n", frame.to_json_string()?);

    // Step 7: PIVOT
    println!("Step 7: PIVOT - Amount by region and year...");
    let pivot = EnginePivot::new(&["region"], "year", "amount")
        .aggfunc("sum")
        .on_in(vec![Value::BigInt(2023), Value::BigInt(2024)])
        .order_by(&["region"])
        .fill_value(Value::Double(0.0));
    println!("  {}\n", ds.pivot_engine(&pivot)?.to_json_string()?);

    // Step 8: MANIFEST
    println!("Step 8: MANIFEST - Files on disk...");
    for entry in ds.manifest()?.entries {
        println!("  {} ({} bytes, crc {:08x})", entry.path.display(), entry.size, entry.crc32);
    }

    ds.close()?;
    println!("\nDone!");
    Ok(())
}

fn sales_batch(rows: &[(i64, &str, i64, f64)]) -> duckpq::Result<Batch> {
    let mut batch = Batch::new(vec![
        Field::new("id", "BIGINT"),
        Field::new("region", "VARCHAR"),
        Field::new("year", "BIGINT"),
        Field::new("amount", "DOUBLE"),
    ])?;
    for (id, region, year, amount) in rows {
        batch.push_row(vec![
            Value::BigInt(*id),
            Value::Text(region.to_string()),
            Value::BigInt(*year),
            Value::Double(*amount),
        ])?;
    }
    Ok(batch)
}
