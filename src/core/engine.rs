use duckdb::{params_from_iter, Connection};
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{Frame, Value};
use crate::query::builder::{create_view_sql, drop_view_sql};
use crate::storage::layout::DatasetLayout;

/// Open the engine handle and apply the configured parallelism.
pub fn connect(config: &Config) -> Result<Connection> {
    let conn = match &config.db_path {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    conn.execute_batch(&format!("SET threads = {}", config.effective_threads()))?;
    Ok(conn)
}

/// Run a query and collect every row.
pub fn query_frame(conn: &Connection, sql: &str, params: &[Value]) -> Result<Frame> {
    debug!(sql, params = params.len(), "query");
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
    let width = columns.len();

    let mut frame = Frame::new(columns);
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(row.get::<_, Value>(i)?);
        }
        frame.rows.push(values);
    }
    Ok(frame)
}

/// Execute a statement, returning the engine's changed-row count.
pub fn execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize> {
    debug!(sql, params = params.len(), "execute");
    Ok(conn.execute(sql, params_from_iter(params.iter()))?)
}

/// Recreate the view over the dataset's current files, or drop it when
/// there are none. Returns whether a view is bound.
pub fn refresh_view(conn: &Connection, layout: &DatasetLayout, view: &str) -> Result<bool> {
    if layout.has_columnar_files()? {
        conn.execute_batch(&create_view_sql(view, &layout.scan_pattern()))?;
        debug!(view, root = %layout.root.display(), "view bound");
        Ok(true)
    } else {
        conn.execute_batch(&drop_view_sql(view))?;
        debug!(view, root = %layout.root.display(), "dataset empty, view dropped");
        Ok(false)
    }
}
