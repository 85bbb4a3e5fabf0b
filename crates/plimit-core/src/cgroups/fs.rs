//! Filesystem primitives used by every cgroup step
//!
//! All mutations go through [`CgroupFs`], which records each step in order
//! and, under dry-run, logs it instead of touching the filesystem.

use serde::Serialize;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use super::types::RunOptions;
use crate::{Error, Result};

/// One filesystem step, as issued (or simulated)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    EnsureDir { path: PathBuf, mode: u32 },
    Write { path: PathBuf, value: String },
    RemoveDir { path: PathBuf },
}

impl Action {
    pub fn path(&self) -> &Path {
        match self {
            Action::EnsureDir { path, .. } | Action::Write { path, .. } => path.as_path(),
            Action::RemoveDir { path } => path.as_path(),
        }
    }

    /// Name of the file written, for `Write` actions
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Action::Write { path, .. } => path.file_name().and_then(|n| n.to_str()),
            _ => None,
        }
    }
}

/// Journaled, dry-run aware access to the cgroup filesystem
#[derive(Debug)]
pub struct CgroupFs {
    opts: RunOptions,
    actions: Vec<Action>,
}

impl CgroupFs {
    pub fn new(opts: RunOptions) -> Self {
        Self {
            opts,
            actions: Vec::new(),
        }
    }

    pub fn opts(&self) -> &RunOptions {
        &self.opts
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    /// Create `path` if missing.
    ///
    /// Succeeds when it already is a directory, fails when something else
    /// occupies the path.
    pub fn ensure_directory(&mut self, path: &Path, mode: u32) -> Result<()> {
        self.actions.push(Action::EnsureDir {
            path: path.to_path_buf(),
            mode,
        });

        if self.opts.dry_run {
            tracing::info!(
                "[dry-run] ACTION: ensure directory | PATH: {:?} | MODE: {:o}",
                path,
                mode
            );
            return Ok(());
        }

        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from_raw_os_error(libc::ENOTDIR),
                })
            }
            Err(_) => {}
        }

        match DirBuilder::new().mode(mode).create(path) {
            Ok(()) => {}
            // lost a race with another creator
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => return Err(Error::from_io(path, e)),
        }

        progress!(
            self.opts,
            "ACTION: ensure directory | PATH: {:?} | MODE: {:o}",
            path,
            mode
        );
        Ok(())
    }

    /// Truncate `path` and write `content` in a single write call.
    pub fn write_text(&mut self, path: &Path, content: &str) -> Result<()> {
        self.actions.push(Action::Write {
            path: path.to_path_buf(),
            value: content.to_string(),
        });

        if self.opts.dry_run {
            tracing::info!(
                "[dry-run] ACTION: write file | PATH: {:?} | DATA: '{}'",
                path,
                content
            );
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::from_io(path, e))?;

        let written = file
            .write(content.as_bytes())
            .map_err(|e| Error::from_io(path, e))?;
        if written != content.len() {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, content.len()),
                ),
            });
        }

        progress!(
            self.opts,
            "ACTION: write file | PATH: {:?} | DATA: '{}'",
            path,
            content
        );
        Ok(())
    }

    /// Remove the (empty) directory at `path`.
    ///
    /// The kernel refuses to remove a cgroup that still has processes or
    /// children; that refusal is reported as a cgroup error.
    pub fn remove_directory(&mut self, path: &Path) -> Result<()> {
        self.actions.push(Action::RemoveDir {
            path: path.to_path_buf(),
        });

        if self.opts.dry_run {
            tracing::info!("[dry-run] ACTION: delete cgroup directory | PATH: {:?}", path);
            return Ok(());
        }

        fs::remove_dir(path).map_err(|e| match e.raw_os_error() {
            Some(libc::EBUSY) | Some(libc::ENOTEMPTY) => Error::Cgroup(format!(
                "cannot remove {:?}: still has processes or child cgroups ({})",
                path, e
            )),
            _ => Error::from_io(path, e),
        })?;

        progress!(self.opts, "ACTION: delete cgroup directory | PATH: {:?}", path);
        Ok(())
    }
}

/// Read a cgroup file to string
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::from_io(path, e))
}
