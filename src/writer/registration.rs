use duckdb::{appender_params_from_iter, Connection};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::core::error::Result;
use crate::core::types::{Batch, Value};
use crate::query::builder::ORDINAL_COLUMN;
use crate::query::ident::quote_ident;

/// Batch registered with the engine as a temporary table for the duration
/// of one mutation. Dropped from the engine when this guard goes away.
///
/// The table carries the batch's fields plus an ordinal column holding each
/// row's position, used to break ties between duplicate keys.
pub struct Registration<'c> {
    conn: &'c Connection,
    name: String,
}

impl<'c> Registration<'c> {
    pub fn register(conn: &'c Connection, batch: &Batch, prefix: &str) -> Result<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}", prefix, &suffix[..8]);

        let mut columns = batch
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), f.sql_type))
            .collect::<Vec<_>>();
        columns.push(format!("{} BIGINT", ORDINAL_COLUMN));
        conn.execute_batch(&format!(
            "CREATE TEMP TABLE {} ({})",
            quote_ident(&name),
            columns.join(", ")
        ))?;
        // From here on the guard owns the table, even if loading fails
        let registration = Registration { conn, name };

        // TEMP tables live in the `temp` catalog's `main` schema
        let mut appender = conn.appender_to_catalog_and_db(&registration.name, "temp", "main")?;
        for (ordinal, row) in batch.rows().iter().enumerate() {
            let ordinal = Value::BigInt(ordinal as i64);
            appender.append_row(appender_params_from_iter(row.iter().chain(std::iter::once(&ordinal))))?;
        }
        appender.flush()?;
        drop(appender);

        debug!(table = %registration.name, rows = batch.len(), "batch registered");
        Ok(registration)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&self.name));
        match self.conn.execute_batch(&sql) {
            Ok(()) => debug!(table = %self.name, "batch unregistered"),
            Err(e) => warn!(table = %self.name, error = %e, "failed to unregister batch"),
        }
    }
}
