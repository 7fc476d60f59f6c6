use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};

const MAX_NAME_ATTEMPTS: usize = 8;

/// Uniquely named scratch directory owned by one in-flight mutation.
///
/// Removed on drop unless it was consumed by `commit_swap`.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    consumed: bool,
}

impl Workspace {
    /// Create `<parent>/<prefix><random>`. `create_dir` fails on an existing
    /// name, so concurrent callers never share a workspace.
    pub fn create(parent: &Path, prefix: &str) -> Result<Self> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string();
            let path = parent.join(format!("{}{}", prefix, &suffix[..8]));
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(workspace = %path.display(), "workspace created");
                    return Ok(Workspace { path, consumed: false });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::new(
                        ErrorKind::Io,
                        format!("failed to create workspace {}: {}", path.display(), e),
                    ))
                }
            }
        }
        Err(Error::new(
            ErrorKind::Io,
            format!("no free workspace name under {}", parent.display()),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Commit point of a full rewrite: the workspace becomes `target`.
    pub fn commit_swap(mut self, target: &Path) -> Result<()> {
        swap(&self.path, target)?;
        self.consumed = true;
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(workspace = %self.path.display(), "workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(workspace = %self.path.display(), error = %e, "failed to remove workspace"),
        }
    }
}

/// Replace `target` with `workspace`: remove the old tree, then rename.
///
/// A crash between the two steps leaves `target` missing. This is the only
/// place that replaces a whole dataset directory.
pub fn swap(workspace: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target).map_err(|e| {
            Error::new(ErrorKind::Io, format!("failed to remove {}: {}", target.display(), e))
        })?;
    }
    fs::rename(workspace, target).map_err(|e| {
        Error::new(
            ErrorKind::Io,
            format!("failed to move {} to {}: {}", workspace.display(), target.display(), e),
        )
    })?;
    debug!(target = %target.display(), "directory swapped");
    Ok(())
}

/// Rename a single file over `target`.
pub fn replace_file(src: &Path, target: &Path) -> Result<()> {
    if target.is_dir() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(src, target).map_err(|e| {
        Error::new(
            ErrorKind::Io,
            format!("failed to move {} to {}: {}", src.display(), target.display(), e),
        )
    })
}

/// Move every partition directory `depth` levels below `workspace` into the
/// same relative place under `target_root`, replacing what is there.
/// Partitions absent from the workspace are not touched. Returns the number
/// of partitions replaced.
pub fn merge_partitions(workspace: &Path, target_root: &Path, depth: usize) -> Result<usize> {
    let mut leaves = Vec::new();
    collect_leaves(workspace, Path::new(""), depth.max(1), &mut leaves)?;
    leaves.sort();

    for relative in &leaves {
        let src = workspace.join(relative);
        let dst = target_root.join(relative);
        if dst.is_dir() {
            fs::remove_dir_all(&dst)?;
        } else if dst.exists() {
            fs::remove_file(&dst)?;
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dst).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                format!("failed to move partition {} into place: {}", relative.display(), e),
            )
        })?;
        debug!(partition = %relative.display(), "partition replaced");
    }
    Ok(leaves.len())
}

fn collect_leaves(base: &Path, relative: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(base.join(relative))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let child = relative.join(entry.file_name());
        if depth == 1 {
            out.push(child);
        } else {
            collect_leaves(base, &child, depth - 1, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workspace_is_removed_when_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::create(tmp.path(), ".ws_").unwrap();
            fs::write(ws.file("a.parquet"), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn workspaces_never_collide() {
        let tmp = TempDir::new().unwrap();
        let a = Workspace::create(tmp.path(), ".ws_").unwrap();
        let b = Workspace::create(tmp.path(), ".ws_").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn swap_replaces_target_contents() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("set");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("old.parquet"), b"old").unwrap();

        let ws = Workspace::create(tmp.path(), ".ws_").unwrap();
        fs::write(ws.file("new.parquet"), b"new").unwrap();
        let ws_path = ws.path().to_path_buf();
        ws.commit_swap(&target).unwrap();

        assert!(!ws_path.exists());
        assert!(!target.join("old.parquet").exists());
        assert_eq!(fs::read(target.join("new.parquet")).unwrap(), b"new");
    }

    #[test]
    fn merge_touches_only_emitted_leaves() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("set");
        for leaf in ["r=EU/y=1", "r=EU/y=2", "r=US/y=1"] {
            fs::create_dir_all(target.join(leaf)).unwrap();
            fs::write(target.join(leaf).join("data_0.parquet"), b"old").unwrap();
        }

        let ws = Workspace::create(tmp.path(), ".ws_").unwrap();
        fs::create_dir_all(ws.path().join("r=EU/y=2")).unwrap();
        fs::write(ws.path().join("r=EU/y=2/data_0.parquet"), b"new").unwrap();
        fs::create_dir_all(ws.path().join("r=JP/y=3")).unwrap();
        fs::write(ws.path().join("r=JP/y=3/data_0.parquet"), b"new").unwrap();

        let replaced = merge_partitions(ws.path(), &target, 2).unwrap();
        assert_eq!(replaced, 2);
        assert_eq!(fs::read(target.join("r=EU/y=1/data_0.parquet")).unwrap(), b"old");
        assert_eq!(fs::read(target.join("r=EU/y=2/data_0.parquet")).unwrap(), b"new");
        assert_eq!(fs::read(target.join("r=US/y=1/data_0.parquet")).unwrap(), b"old");
        assert_eq!(fs::read(target.join("r=JP/y=3/data_0.parquet")).unwrap(), b"new");
    }

    #[test]
    fn replace_file_overwrites() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.parquet");
        let dst = tmp.path().join("dst.parquet");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();
        replace_file(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }
}
