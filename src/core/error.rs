use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,  // Bad dataset path, keys, partition columns or options
    Schema,         // Batch/dataset column mismatch, unknown update target
    Query,          // Generated SQL rejected or failed inside the engine
    Io,             // Workspace creation, removal or rename
    NotFound,       // Read or rewrite of an empty dataset
    InvalidState,   // Operation on a closed dataset
    Locked,         // Another writer holds the dataset lock
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn configuration(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Configuration, context.into())
    }

    pub fn schema(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Schema, context.into())
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    /// Prefix the context with the operation and dataset it came from.
    pub fn with_context(mut self, prefix: impl fmt::Display) -> Self {
        self.context = format!("{}: {}", prefix, self.context);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error {
            kind: ErrorKind::Query,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Query,
            context: format!("JSON error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
