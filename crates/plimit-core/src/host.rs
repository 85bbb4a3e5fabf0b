//! Host capability probes checked before the engine mutates anything

use caps::{CapSet, Capability};
use nix::unistd::geteuid;
use std::path::Path;

/// Facts about the running host the engine depends on
pub trait Host {
    /// True when `root` is a mounted cgroup v2 hierarchy
    fn has_cgroup_v2(&self, root: &Path) -> bool;

    /// True when the caller may manipulate the hierarchy
    fn is_privileged(&self) -> bool;
}

/// Probes the real host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn has_cgroup_v2(&self, root: &Path) -> bool {
        root.join("cgroup.controllers").exists()
    }

    fn is_privileged(&self) -> bool {
        if geteuid().is_root() {
            return true;
        }
        caps::has_cap(None, CapSet::Effective, Capability::CAP_SYS_ADMIN).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_cgroup_v2_checks_controllers_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = SystemHost;

        assert!(!host.has_cgroup_v2(dir.path()));

        std::fs::write(dir.path().join("cgroup.controllers"), "cpu memory io\n").unwrap();
        assert!(host.has_cgroup_v2(dir.path()));
    }

    #[test]
    fn test_root_is_privileged() {
        if geteuid().is_root() {
            assert!(SystemHost.is_privileged());
        }
    }
}
