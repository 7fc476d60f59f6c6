use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::Serialize;
use tracing::{debug, info};
use crate::core::config::Config;
use crate::core::engine::execute;
use crate::core::error::{Error, Result};
use crate::core::types::{Batch, SetValue, Value};
use crate::query::builder::{copy_sql, dedup_sql, retain_sql, ExistingScope, DATA_FILE};
use crate::query::expr::UpdateProjection;
use crate::schema::schema::{introspect, DatasetSchema};
use crate::storage::atomic::{merge_partitions, replace_file, Workspace};
use crate::storage::layout::DatasetLayout;
use crate::writer::registration::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutationKind {
    Upsert,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MutationKind::Upsert => write!(f, "upsert"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

/// What a committed mutation wrote
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub kind: MutationKind,
    pub rows_written: usize,
    pub partitions_replaced: usize,   // 0 for whole-dataset rewrites
    pub committed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Read-recompute-write-swap over one dataset.
///
/// Every operation materializes its full result into a fresh workspace
/// first; the live directory is only touched by the final swap or merge.
/// Callers serialize mutations: one engine per dataset at a time.
pub struct MutationEngine<'a> {
    pub conn: &'a Connection,
    pub layout: &'a DatasetLayout,
    pub config: &'a Config,
    pub view: &'a str,
}

impl<'a> MutationEngine<'a> {
    pub fn new(conn: &'a Connection, layout: &'a DatasetLayout, config: &'a Config, view: &'a str) -> Self {
        MutationEngine { conn, layout, config, view }
    }

    /// Insert-or-overwrite by `keys`. A batch row always displaces an
    /// existing row with the same key; among duplicate keys inside the
    /// batch, the later row wins.
    pub fn upsert(&self, batch: &Batch, keys: &[String], partition_by: &[String]) -> Result<MutationOutcome> {
        let started = Instant::now();
        validate_upsert_args(batch, keys, partition_by)?;
        if batch.is_empty() {
            debug!(dataset = %self.layout.root.display(), "empty batch, nothing to upsert");
            return Ok(self.outcome(MutationKind::Upsert, 0, 0, started));
        }

        // Validate against the live schema before touching the filesystem
        let schema = if self.layout.has_columnar_files()? {
            let schema = introspect(self.conn, self.view)?;
            check_same_columns(&schema, &batch.column_names())?;
            Some(schema)
        } else {
            None
        };
        let registration = Registration::register(self.conn, batch, "incoming")?;
        let workspace = Workspace::create(&self.layout.parent, &self.config.workspace_prefix)?;

        let Some(schema) = schema else {
            let sql = dedup_sql(&batch.column_names(), &[], keys, ExistingScope::None, registration.name());
            let rows = self.copy_into(&sql, &workspace, partition_by, &[])?;
            workspace.commit_swap(&self.layout.root)?;
            return Ok(self.outcome(MutationKind::Upsert, rows, 0, started));
        };

        // Batch values are cast to the dataset's types
        let columns = schema.names();
        let types = schema.types();

        if partition_by.is_empty() {
            let scope = ExistingScope::Whole { view: self.view };
            let sql = dedup_sql(&columns, &types, keys, scope, registration.name());
            let rows = self.copy_into(&sql, &workspace, &[], &[])?;

            let data_file = self.layout.data_file();
            if self.layout.columnar_files()? == [data_file.clone()] {
                replace_file(&workspace.file(DATA_FILE), &data_file)?;
            } else {
                workspace.commit_swap(&self.layout.root)?;
            }
            return Ok(self.outcome(MutationKind::Upsert, rows, 0, started));
        }

        let scope = ExistingScope::Partitions { view: self.view, partition_by };
        let sql = dedup_sql(&columns, &types, keys, scope, registration.name());
        let rows = self.copy_into(&sql, &workspace, partition_by, &[])?;
        let replaced = merge_partitions(workspace.path(), &self.layout.root, partition_by.len())?;
        Ok(self.outcome(MutationKind::Upsert, rows, replaced, started))
    }

    /// Rewrite every row, assigning `set` where `where_clause` holds (or
    /// everywhere without one).
    pub fn update(
        &self,
        set: &BTreeMap<String, SetValue>,
        where_clause: Option<&str>,
        partition_by: &[String],
        params: &[Value],
    ) -> Result<MutationOutcome> {
        let started = Instant::now();
        let schema = self.populated_schema()?;
        check_partition_columns(&schema, partition_by)?;

        let projection = UpdateProjection::build(&schema.names(), set, where_clause, params)?;
        let (select_sql, bound) = projection.to_sql(self.view);
        let rows = self.rewrite(&select_sql, partition_by, &bound)?;
        Ok(self.outcome(MutationKind::Update, rows, 0, started))
    }

    /// Rewrite the dataset without the rows matching `where_clause`.
    pub fn delete(&self, where_clause: &str, partition_by: &[String], params: &[Value]) -> Result<MutationOutcome> {
        let started = Instant::now();
        if where_clause.trim().is_empty() {
            return Err(Error::configuration("delete requires a WHERE condition"));
        }
        let schema = self.populated_schema()?;
        check_partition_columns(&schema, partition_by)?;

        let rows = self.rewrite(&retain_sql(self.view, where_clause), partition_by, params)?;
        Ok(self.outcome(MutationKind::Delete, rows, 0, started))
    }

    fn populated_schema(&self) -> Result<DatasetSchema> {
        if !self.layout.has_columnar_files()? {
            return Err(Error::not_found(format!(
                "dataset {} has no columnar files",
                self.layout.root.display()
            )));
        }
        introspect(self.conn, self.view)
    }

    /// Materialize `select_sql` into a workspace and swap it in wholesale.
    fn rewrite(&self, select_sql: &str, partition_by: &[String], params: &[Value]) -> Result<usize> {
        let workspace = Workspace::create(&self.layout.parent, &self.config.workspace_prefix)?;
        let rows = self.copy_into(select_sql, &workspace, partition_by, params)?;
        workspace.commit_swap(&self.layout.root)?;
        Ok(rows)
    }

    fn copy_into(&self, select_sql: &str, workspace: &Workspace, partition_by: &[String], params: &[Value]) -> Result<usize> {
        let target = if partition_by.is_empty() {
            workspace.file(DATA_FILE)
        } else {
            workspace.path().to_path_buf()
        };
        let sql = copy_sql(select_sql, &target, &self.config.compression, partition_by);
        execute(self.conn, &sql, params)
    }

    fn outcome(&self, kind: MutationKind, rows: usize, partitions: usize, started: Instant) -> MutationOutcome {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            op = %kind,
            dataset = %self.layout.root.display(),
            rows,
            partitions,
            elapsed_ms,
            "mutation committed"
        );
        MutationOutcome {
            kind,
            rows_written: rows,
            partitions_replaced: partitions,
            committed_at: Utc::now(),
            elapsed_ms,
        }
    }
}

fn validate_upsert_args(batch: &Batch, keys: &[String], partition_by: &[String]) -> Result<()> {
    if keys.is_empty() {
        return Err(Error::configuration("upsert requires at least one key column"));
    }
    for key in keys {
        if !batch.has_column(key) {
            return Err(Error::configuration(format!("key column '{}' is not in the batch", key)));
        }
    }
    for column in partition_by {
        if !batch.has_column(column) {
            return Err(Error::configuration(format!(
                "partition column '{}' is not in the batch",
                column
            )));
        }
    }
    if partition_by.len() >= batch.fields().len() {
        return Err(Error::configuration("partition columns must leave at least one data column"));
    }
    Ok(())
}

fn check_same_columns(schema: &DatasetSchema, batch_columns: &[String]) -> Result<()> {
    let (missing, unexpected) = schema.diff_names(batch_columns);
    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(Error::schema(format!(
        "batch columns differ from dataset: missing {:?}, unexpected {:?}",
        missing, unexpected
    )))
}

fn check_partition_columns(schema: &DatasetSchema, partition_by: &[String]) -> Result<()> {
    match partition_by.iter().find(|c| !schema.contains(c)) {
        Some(column) => Err(Error::configuration(format!(
            "partition column '{}' is not a dataset column",
            column
        ))),
        None => Ok(()),
    }
}
