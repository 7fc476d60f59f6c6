use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::query::ident::is_identifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub name: Option<String>,         // View name, defaults to the directory basename
    pub threads: usize,               // Engine threads, 0 = all cores
    pub db_path: Option<PathBuf>,     // Engine database file, None = in-memory
    pub compression: String,          // Parquet codec used by every COPY
    pub lock_writes: bool,            // Advisory writer lock per mutation
    pub workspace_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: None,
            threads: 1,
            db_path: None,
            compression: "zstd".to_string(),
            lock_writes: true,
            workspace_prefix: ".__parquet_rewrite_".to_string(),
        }
    }
}

impl Config {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_all_cores(self) -> Self {
        self.with_threads(0)
    }

    pub fn with_db_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.db_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_compression(mut self, codec: &str) -> Self {
        self.compression = codec.to_string();
        self
    }

    pub fn with_lock_writes(mut self, enabled: bool) -> Self {
        self.lock_writes = enabled;
        self
    }

    /// Load from a JSON document; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn validate(&self) -> Result<()> {
        // The codec is interpolated into COPY options, never bound
        if !is_identifier(&self.compression) {
            return Err(Error::configuration(format!(
                "invalid compression codec '{}'",
                self.compression
            )));
        }
        if self.workspace_prefix.is_empty()
            || self.workspace_prefix.contains(std::path::MAIN_SEPARATOR)
            || self.workspace_prefix.contains('/')
        {
            return Err(Error::configuration(format!(
                "invalid workspace prefix '{}'",
                self.workspace_prefix
            )));
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(Error::configuration("view name must not be empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_single_thread_zstd() {
        let config = Config::default();
        assert_eq!(config.threads, 1);
        assert_eq!(config.compression, "zstd");
        assert!(config.lock_writes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_only_given_fields() {
        let config = Config::from_json(r#"{"threads": 4, "compression": "snappy"}"#).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.compression, "snappy");
        assert_eq!(config.workspace_prefix, ".__parquet_rewrite_");
    }

    #[test]
    fn rejects_codec_that_is_not_a_bare_word() {
        let config = Config::default().with_compression("zstd'); DROP VIEW x; --");
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_threads_means_all_cores() {
        assert_eq!(Config::default().with_all_cores().effective_threads(), num_cpus::get());
    }
}
