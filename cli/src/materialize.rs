//! Atomic materialization of build artifacts.
//!
//! Every artifact is written to a temporary file in its destination
//! directory and renamed into place, so a later build step can never
//! observe a half-written file. Placement is all-or-nothing: the first
//! failure rolls back every file placed earlier in the same run.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::MaterializeError;

/// One file to place in the output directory.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Path relative to the output directory.
    pub rel_path: String,
    pub content: Vec<u8>,
    /// Mode bits applied to the placed file.
    pub mode: u32,
}

impl Artifact {
    #[must_use]
    pub fn new(rel_path: impl Into<String>, content: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self {
            rel_path: rel_path.into(),
            content: content.into(),
            mode,
        }
    }
}

/// Place all artifacts under `root`, atomically and all-or-nothing.
///
/// Reruns against the same artifacts are idempotent: files are replaced in
/// place, never appended to or duplicated.
///
/// # Errors
///
/// Returns [`MaterializeError`] on the first I/O failure, after removing
/// the files this run had already placed.
pub fn materialize(root: &Path, artifacts: &[Artifact]) -> Result<(), MaterializeError> {
    let mut placed: Vec<PathBuf> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        match place(root, artifact) {
            Ok(path) => placed.push(path),
            Err(err) => {
                for path in &placed {
                    let _ = std::fs::remove_file(path);
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

fn place(root: &Path, artifact: &Artifact) -> Result<PathBuf, MaterializeError> {
    let target = root.join(&artifact.rel_path);
    let parent = target.parent().unwrap_or(root).to_path_buf();
    let write_err = |source| MaterializeError::Write {
        path: target.clone(),
        source,
    };

    std::fs::create_dir_all(&parent).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(&artifact.content).map_err(write_err)?;
    set_mode(tmp.as_file(), artifact.mode).map_err(write_err)?;
    tmp.persist(&target).map_err(|e| MaterializeError::Persist {
        path: target.clone(),
        source: e.error,
    })?;
    Ok(target)
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
