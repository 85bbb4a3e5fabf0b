//! Mapping from relative cgroup names to absolute paths

use std::path::{Component, Path, PathBuf};

use crate::config::EngineConfig;
use crate::{Error, Result};

/// Longest path the kernel accepts (PATH_MAX, including the NUL)
const PATH_MAX: usize = 4096;

/// Absolute locations of a cgroup and the parent it hangs from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupPaths {
    pub cgroup: PathBuf,
    pub parent: PathBuf,
}

/// Resolve `name` under the configured root.
///
/// `plimit/1234` -> (`{root}/plimit/1234`, `{root}/plimit`).
/// A name without '/' is grouped under `{root}/{default_parent}`:
/// `web` -> (`{root}/plimit/web`, `{root}/plimit`).
pub fn resolve(config: &EngineConfig, name: &str) -> Result<CgroupPaths> {
    validate_name(name)?;

    let (parent_rel, cgroup_rel) = match name.rfind('/') {
        Some(idx) => (name[..idx].to_string(), name.to_string()),
        None => (
            config.default_parent.clone(),
            format!("{}/{}", config.default_parent, name),
        ),
    };

    Ok(CgroupPaths {
        cgroup: join_checked(&config.cgroup_root, &cgroup_rel)?,
        parent: join_checked(&config.cgroup_root, &parent_rel)?,
    })
}

/// Every directory from the first segment below the root down to `path`
pub fn ancestors_below_root(root: &Path, path: &Path) -> Vec<PathBuf> {
    let Ok(rel) = path.strip_prefix(root) else {
        return Vec::new();
    };

    let mut current = root.to_path_buf();
    rel.components()
        .map(|component| {
            current.push(component);
            current.clone()
        })
        .collect()
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("cgroup name is empty".to_string()));
    }

    if name.starts_with('/') {
        return Err(Error::InvalidArgument(format!(
            "cgroup name must be relative to the cgroup root: '{}'",
            name
        )));
    }

    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::InvalidArgument(format!(
            "cgroup name has an empty, '.' or '..' segment: '{}'",
            name
        )));
    }

    Ok(())
}

fn join_checked(root: &Path, rel: &str) -> Result<PathBuf> {
    let joined = root.join(rel);

    if !joined.starts_with(root)
        || Path::new(rel)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(Error::InvalidArgument(format!(
            "path {:?} escapes cgroup root {:?}",
            joined, root
        )));
    }

    if joined.as_os_str().len() >= PATH_MAX {
        return Err(Error::InvalidArgument(format!(
            "cgroup path exceeds {} bytes: {}...",
            PATH_MAX,
            rel.chars().take(32).collect::<String>()
        )));
    }

    Ok(joined)
}
