use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::{Error, Result};
use crate::query::builder::DATA_FILE;
use crate::query::ident::sanitize_view_name;

const COLUMNAR_EXTENSION: &str = "parquet";

/// Directory structure of one dataset
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root: PathBuf,      // Absolute dataset directory
    pub parent: PathBuf,    // Holds workspaces and the lock file
    pub base_name: String,
}

impl DatasetLayout {
    /// Resolve `path` to an absolute directory, creating it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() && !path.is_dir() {
            return Err(Error::configuration(format!(
                "dataset path {} exists and is not a directory",
                path.display()
            )));
        }
        fs::create_dir_all(path)?;
        let root = fs::canonicalize(path)?;

        let parent = root
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::configuration(format!("dataset path {} has no parent", root.display())))?;
        let base_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DatasetLayout { root, parent, base_name })
    }

    pub fn default_view_name(&self) -> String {
        sanitize_view_name(&self.base_name)
    }

    /// Glob handed to the engine's scan.
    pub fn scan_pattern(&self) -> String {
        self.root.join("**").join(format!("*.{}", COLUMNAR_EXTENSION)).to_string_lossy().into_owned()
    }

    /// Single file of an unpartitioned dataset
    pub fn data_file(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    /// Lives beside the root so a full swap never removes it.
    pub fn lock_path(&self) -> PathBuf {
        self.parent.join(format!(".{}.lock", self.base_name))
    }

    pub fn has_columnar_files(&self) -> Result<bool> {
        Ok(first_columnar_file(&self.root)?.is_some())
    }

    /// Every columnar file under the root, sorted.
    pub fn columnar_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_columnar_files(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Hive partition columns, read from the `key=value` directories above
    /// the first columnar file. Empty for a flat dataset.
    pub fn partition_columns(&self) -> Result<Vec<String>> {
        let Some(file) = first_columnar_file(&self.root)? else {
            return Ok(Vec::new());
        };
        let relative = file.strip_prefix(&self.root).unwrap_or(&file);
        let mut columns = Vec::new();
        if let Some(dirs) = relative.parent() {
            for component in dirs.components() {
                let segment = component.as_os_str().to_string_lossy();
                match parse_partition_segment(&segment) {
                    Some((key, _)) => columns.push(key.to_string()),
                    None => break,
                }
            }
        }
        Ok(columns)
    }
}

/// Split a `key=value` directory name.
pub fn parse_partition_segment(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

fn is_columnar(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(COLUMNAR_EXTENSION)
}

fn first_columnar_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in &entries {
        let path = entry.path();
        if path.is_file() && is_columnar(&path) {
            return Ok(Some(path));
        }
    }
    for entry in &entries {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = first_columnar_file(&path)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn collect_columnar_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_columnar_files(&path, out)?;
        } else if is_columnar(&path) {
            out.push(path);
        }
    }
    Ok(())
}
