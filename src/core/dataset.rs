use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use duckdb::Connection;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::engine::{self, connect, query_frame, refresh_view};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Batch, Frame, SetValue, Value};
use crate::query::builder::{count_sql, EnginePivot, SelectQuery};
use crate::query::pivot::LocalPivot;
use crate::schema::schema::{introspect, ColumnInfo, DatasetSchema};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::DatasetLayout;
use crate::storage::manifest::FileManifest;
use crate::writer::mutation::{MutationEngine, MutationKind, MutationOutcome};

struct State {
    conn: Option<Connection>,   // None once closed
    view_bound: bool,           // Populated: a view exists over >= 1 file
}

/// A directory of parquet files behaving as one updatable table.
///
/// The handle exclusively owns its engine connection. Calls are serialized
/// through an internal lock, and each mutation additionally holds an
/// advisory file lock so a second process cannot write concurrently.
pub struct Dataset {
    config: Config,
    layout: DatasetLayout,
    view_name: String,
    state: Mutex<State>,
}

impl Dataset {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        config.validate()?;
        let layout = DatasetLayout::open(path)?;
        let view_name = config.name.clone().unwrap_or_else(|| layout.default_view_name());

        let conn = connect(&config)?;
        let view_bound = refresh_view(&conn, &layout, &view_name)?;
        debug!(dataset = %layout.root.display(), view = %view_name, populated = view_bound, "dataset opened");

        Ok(Dataset {
            config,
            layout,
            view_name,
            state: Mutex::new(State { conn: Some(conn), view_bound }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.layout.root
    }

    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// False until the first write lands (or after every file is gone).
    pub fn is_populated(&self) -> bool {
        self.state.lock().view_bound
    }

    /// Rebind the view to the files currently on disk.
    pub fn refresh(&self) -> Result<()> {
        let mut state = self.state.lock();
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;
        let bound = refresh_view(conn, &self.layout, &self.view_name)?;
        state.view_bound = bound;
        Ok(())
    }

    /// Release the engine handle. Every later call fails with InvalidState.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.conn.take() {
            Some(conn) => {
                state.view_bound = false;
                conn.close().map_err(|(_, e)| Error::from(e))?;
                debug!(dataset = %self.layout.root.display(), "dataset closed");
                Ok(())
            }
            None => Err(self.closed_error()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().conn.is_none()
    }

    pub fn schema(&self) -> Result<Vec<ColumnInfo>> {
        Ok(self.describe()?.columns)
    }

    pub fn columns(&self) -> Result<Vec<String>> {
        Ok(self.describe()?.names())
    }

    /// Hive partition columns of the files on disk, outermost first.
    pub fn partition_columns(&self) -> Result<Vec<String>> {
        self.layout.partition_columns()
    }

    pub fn select(&self, query: &SelectQuery) -> Result<Frame> {
        self.read(|conn| query_frame(conn, &query.to_sql(&self.view_name), &query.params))
    }

    /// Rows matching `where_clause`. An empty dataset counts zero.
    pub fn count(&self, where_clause: Option<&str>, params: &[Value]) -> Result<u64> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;
        if !state.view_bound {
            return Ok(0);
        }
        let frame = query_frame(conn, &count_sql(&self.view_name, where_clause), params)?;
        match frame.rows.first().and_then(|r| r.first()) {
            Some(Value::BigInt(n)) => Ok(*n as u64),
            Some(Value::HugeInt(n)) => Ok(*n as u64),
            Some(Value::UBigInt(n)) => Ok(*n),
            other => Err(Error::new(ErrorKind::Query, format!("unexpected COUNT result {:?}", other))),
        }
    }

    /// Wide reshape executed by the engine's PIVOT.
    pub fn pivot_engine(&self, pivot: &EnginePivot) -> Result<Frame> {
        let sql = pivot.to_sql(&self.view_name)?;
        let mut frame = self.read(|conn| query_frame(conn, &sql, &pivot.params))?;
        if let Some(fill) = &pivot.fill_value {
            for value in frame.rows.iter_mut().flatten() {
                if *value == Value::Null {
                    *value = fill.clone();
                }
            }
        }
        Ok(frame)
    }

    /// Wide reshape done in memory, for aggregations the engine cannot
    /// express.
    pub fn pivot_local(&self, pivot: &LocalPivot) -> Result<Frame> {
        let frame = self.select(&pivot.source_query())?;
        pivot.apply(&frame)
    }

    /// Run arbitrary SQL against the dataset's connection.
    pub fn raw_query(&self, sql: &str, params: &[Value]) -> Result<Frame> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;
        query_frame(conn, sql, params)
    }

    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;
        engine::execute(conn, sql, params)
    }

    /// Insert-or-overwrite `batch` by `keys`. `partition_by` defaults to the
    /// dataset's existing layout.
    pub fn upsert(&self, batch: &Batch, keys: &[&str], partition_by: Option<&[&str]>) -> Result<MutationOutcome> {
        let keys = owned(keys);
        self.mutate(MutationKind::Upsert, partition_by, |engine, parts| engine.upsert(batch, &keys, parts))
    }

    pub fn update(
        &self,
        set: &[(&str, SetValue)],
        where_clause: Option<&str>,
        partition_by: Option<&[&str]>,
        params: &[Value],
    ) -> Result<MutationOutcome> {
        let set: BTreeMap<String, SetValue> = set.iter().map(|(c, v)| (c.to_string(), v.clone())).collect();
        self.mutate(MutationKind::Update, partition_by, |engine, parts| {
            engine.update(&set, where_clause, parts, params)
        })
    }

    pub fn delete(&self, where_clause: &str, partition_by: Option<&[&str]>, params: &[Value]) -> Result<MutationOutcome> {
        self.mutate(MutationKind::Delete, partition_by, |engine, parts| {
            engine.delete(where_clause, parts, params)
        })
    }

    /// Checksummed listing of the dataset's files.
    pub fn manifest(&self) -> Result<FileManifest> {
        FileManifest::capture(&self.layout)
    }

    fn describe(&self) -> Result<DatasetSchema> {
        self.read(|conn| introspect(conn, &self.view_name))
    }

    /// Run a read that needs the view.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;
        if !state.view_bound {
            return Err(self.empty_error());
        }
        f(conn)
    }

    /// Shared shell of every mutation: writer lock, partition layout,
    /// error context, and the view refresh that follows success or failure.
    fn mutate<T>(
        &self,
        kind: MutationKind,
        partition_by: Option<&[&str]>,
        f: impl FnOnce(&MutationEngine, &[String]) -> Result<T>,
    ) -> Result<T> {
        let context = format!("{} {}", kind, self.layout.root.display());
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let conn = state.conn.as_ref().ok_or_else(|| self.closed_error())?;

        let _writer_lock = if self.config.lock_writes {
            Some(FileLock::acquire(&self.layout.lock_path()).map_err(|e| e.with_context(&context))?)
        } else {
            None
        };

        let result = self
            .resolve_partitions(partition_by)
            .and_then(|parts| {
                // Files may have appeared since the last refresh
                if !state.view_bound && self.layout.has_columnar_files()? {
                    state.view_bound = refresh_view(conn, &self.layout, &self.view_name)?;
                }
                let engine = MutationEngine::new(conn, &self.layout, &self.config, &self.view_name);
                f(&engine, &parts)
            })
            .map_err(|e| e.with_context(&context));

        match refresh_view(conn, &self.layout, &self.view_name) {
            Ok(bound) => state.view_bound = bound,
            Err(e) => {
                warn!(dataset = %self.layout.root.display(), error = %e, "view refresh failed");
                if result.is_ok() {
                    return Err(e.with_context(&context));
                }
            }
        }
        if let Err(e) = &result {
            info!(dataset = %self.layout.root.display(), error = %e, "mutation aborted, dataset unchanged");
        }
        result
    }

    /// Explicit partition columns must match the layout already on disk.
    fn resolve_partitions(&self, requested: Option<&[&str]>) -> Result<Vec<String>> {
        let existing = self.layout.partition_columns()?;
        match requested {
            None => Ok(existing),
            Some(requested) => {
                let requested = owned(requested);
                if self.layout.has_columnar_files()? && requested != existing {
                    return Err(Error::configuration(format!(
                        "partition columns {:?} conflict with the dataset layout {:?}",
                        requested, existing
                    )));
                }
                Ok(requested)
            }
        }
    }

    fn closed_error(&self) -> Error {
        Error::new(
            ErrorKind::InvalidState,
            format!("dataset {} is closed", self.layout.root.display()),
        )
    }

    fn empty_error(&self) -> Error {
        Error::not_found(format!(
            "dataset {} has no columnar files",
            self.layout.root.display()
        ))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let columns = self.columns().unwrap_or_default();
        write!(f, "DuckPQ@{}(Columns={:?})", self.layout.root.display(), columns)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("root", &self.layout.root)
            .field("view", &self.view_name)
            .field("populated", &self.is_populated())
            .finish()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
