pub mod core;
pub mod storage;
pub mod schema;
pub mod query;
pub mod writer;

pub use crate::core::config::Config;
pub use crate::core::dataset::Dataset;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::logging::{LogConfig, LogStyle};
pub use crate::core::types::{Batch, Field, Frame, SetValue, Value};
pub use crate::query::builder::{EnginePivot, SelectQuery};
pub use crate::query::pivot::{Aggregate, LocalPivot};
pub use crate::schema::schema::ColumnInfo;
pub use crate::storage::manifest::{FileManifest, ManifestEntry};
pub use crate::writer::mutation::{MutationKind, MutationOutcome};

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               DUCKPQ STRUCT ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct Dataset                                        │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                    // Threads, codec, lock, workspace prefix  │ │    │
│  │  │ layout: DatasetLayout             // Root, parent, lock path                 │ │    │
│  │  │ view_name: String                 // Engine view over the parquet glob       │ │    │
│  │  │ state: Mutex<State>               // Connection + Empty/Populated flag       │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ struct Batch     │  │ struct Frame                          │    │
│  │ • name           │  │ • fields: Vec<   │  │ • columns: Vec<String>                │    │
│  │ • threads        │  │   Field>         │  │ • rows: Vec<Vec<Value>>               │    │
│  │ • db_path        │  │ • rows: Vec<Vec< │  │ • to_json()                           │    │
│  │ • compression    │  │   Value>>        │  └───────────────────────────────────────┘    │
│  │ • lock_writes    │  └──────────────────┘                                                │
│  └──────────────────┘  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│                        │ enum SetValue    │  │ struct Error                          │    │
│                        │ • Literal(Value) │  │ • kind: ErrorKind                     │    │
│                        │ • Expression(..) │  │ • context: String                     │    │
│                        └──────────────────┘  └───────────────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── MUTATION LAYER ─────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                           struct MutationEngine                                     │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ upsert()   register batch -> dedup -> COPY to workspace -> swap / merge      │ │    │
│  │  │ update()   CASE WHEN projection -> COPY to workspace -> swap                 │ │    │
│  │  │ delete()   WHERE NOT (cond) -> COPY to workspace -> swap                     │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌────────────────────────┐      │
│  │ struct Registration    │  │ struct Workspace        │  │ struct FileLock        │      │
│  │ • TEMP table + ordinal │  │ • sibling of the root   │  │ • flock on .<base>.lock│      │
│  │ • dropped on Drop      │  │ • removed on Drop       │  │ • released on Drop     │      │
│  └────────────────────────┘  └─────────────────────────┘  └────────────────────────┘      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── QUERY LAYER ───────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌─────────────────────┐            │
│  │ struct SelectQuery     │  │ struct EnginePivot   │  │ struct LocalPivot   │            │
│  │ • projection           │  │ • PIVOT ... ON ...   │  │ • Aggregate         │            │
│  │ • where + params       │  │   USING agg(values)  │  │ • fill / dropna     │            │
│  │ • order / limit        │  └──────────────────────┘  └─────────────────────┘            │
│  └────────────────────────┘  ┌──────────────────────┐  ┌─────────────────────┐            │
│                               │ fn quote_ident       │  │ struct UpdateProj.  │            │
│                               │ fn sanitize_view_name│  │ • ColumnExpr        │            │
│                               └──────────────────────┘  └─────────────────────┘            │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── RELATIONSHIPS ────────────────────────────────────────────┐
│                                                                                              │
│  Dataset ──owns──> Connection ──binds──> view ──scans──> parquet files under <root>         │
│     │                                                                                       │
│     ├──reads──> SelectQuery / EnginePivot / LocalPivot ──produce──> Frame                  │
│     │                                                                                       │
│     └──mutates_via──> MutationEngine ──uses──> Registration (batch table)                  │
│                             │                                                               │
│                             ├──writes──> Workspace ──swap──> root                          │
│                             │                  └──merge──> root/<k=v>/...                   │
│                             │                                                               │
│                             └──guarded_by──> FileLock                                       │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
