use std::fs;
use std::path::PathBuf;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::storage::layout::DatasetLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,  // Relative to the dataset root
    pub size: u64,
    pub crc32: u32,
}

/// Checksummed listing of a dataset's columnar files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileManifest {
    pub entries: Vec<ManifestEntry>,
}

impl FileManifest {
    pub fn capture(layout: &DatasetLayout) -> Result<Self> {
        let files = layout.columnar_files()?;
        let entries = files
            .par_iter()
            .map(|path| -> Result<ManifestEntry> {
                let data = fs::read(path)?;
                Ok(ManifestEntry {
                    path: path.strip_prefix(&layout.root).unwrap_or(path).to_path_buf(),
                    size: data.len() as u64,
                    crc32: crc32fast::hash(&data),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FileManifest { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose relative path starts with `prefix`, e.g. `region=EU`.
    pub fn under(&self, prefix: &str) -> Vec<&ManifestEntry> {
        self.entries.iter().filter(|e| e.path.starts_with(prefix)).collect()
    }
}
