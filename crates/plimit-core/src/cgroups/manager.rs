//! Lifecycle orchestration: create, limit, attach and delete
//!
//! ```text
//! START ─┬─ delete ──────────────────────────────────────────────┐
//!        └─ create ─ PARENT_READY ─ SELF_READY ─ LIMITS_APPLIED ─ ATTACHED ─ DONE
//! ```
//!
//! Each step fails fast. Nothing is rolled back: the hierarchy is left as the
//! last successful step made it, for the caller to inspect or retry.
//!
//! Concurrent invocations are not coordinated; the kernel is the only arbiter
//! of racing writes to the same cgroup.

use serde::Serialize;
use std::path::PathBuf;

use super::controller::{enable_controllers, CpuController, IoController, MemoryController};
use super::fs::{Action, CgroupFs};
use super::path::{ancestors_below_root, resolve, CgroupPaths};
use super::procs;
use super::types::{LimitSpec, RunOptions};
use crate::config::EngineConfig;
use crate::host::{Host, SystemHost};
use crate::{Error, Result};

/// What a successful call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Directory ensured, limits written, process attached if given
    Applied,
    /// Directory ensured and process attached, limits untouched
    Attached,
    Deleted,
    Cleared,
}

/// Ordered record of the filesystem steps taken by one request
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub cgroup: PathBuf,
    pub outcome: Outcome,
    pub dry_run: bool,
    pub actions: Vec<Action>,
}

impl ApplyReport {
    /// Names of the files written, in order
    pub fn written_files(&self) -> Vec<&str> {
        self.actions.iter().filter_map(Action::file_name).collect()
    }
}

/// Cgroup v2 orchestration engine
pub struct CgroupManager<H = SystemHost> {
    config: EngineConfig,
    host: H,
}

impl CgroupManager<SystemHost> {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_host(config, SystemHost)
    }
}

impl<H: Host> CgroupManager<H> {
    pub fn with_host(config: EngineConfig, host: H) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, host })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a cgroup name against this engine's root
    pub fn resolve(&self, name: &str) -> Result<CgroupPaths> {
        resolve(&self.config, name)
    }

    /// Run one request: delete, or create/limit/attach.
    pub fn apply(&self, spec: &LimitSpec) -> Result<ApplyReport> {
        spec.validate()?;

        if spec.delete {
            self.delete(spec)
        } else {
            self.create(spec)
        }
    }

    /// PIDs currently in cgroup `name`
    pub fn list_members(&self, name: &str) -> Result<Vec<String>> {
        let paths = self.resolve(name)?;
        procs::list(&paths.cgroup)
    }

    /// Empty `cgroup.procs` of cgroup `name`.
    ///
    /// Never invoked implicitly; a delete fails while processes remain.
    pub fn clear_members(&self, name: &str, opts: RunOptions) -> Result<ApplyReport> {
        self.check_preconditions()?;
        let paths = self.resolve(name)?;

        let mut cgfs = CgroupFs::new(opts);
        procs::clear(&mut cgfs, &paths.cgroup)?;

        Ok(self.report(paths.cgroup, Outcome::Cleared, cgfs))
    }

    fn check_preconditions(&self) -> Result<()> {
        if !self.host.has_cgroup_v2(&self.config.cgroup_root) {
            return Err(Error::CgroupV2NotAvailable(self.config.controllers_file()));
        }
        if !self.host.is_privileged() {
            return Err(Error::InsufficientPrivileges);
        }
        Ok(())
    }

    fn delete(&self, spec: &LimitSpec) -> Result<ApplyReport> {
        let name = spec.name()?;
        self.check_preconditions()?;

        let paths = self.resolve(name)?;
        let mut cgfs = CgroupFs::new(spec.opts);
        cgfs.remove_directory(&paths.cgroup)?;

        Ok(self.report(paths.cgroup, Outcome::Deleted, cgfs))
    }

    fn create(&self, spec: &LimitSpec) -> Result<ApplyReport> {
        let name = spec.name()?;
        self.check_preconditions()?;

        let paths = self.resolve(name)?;
        let mut cgfs = CgroupFs::new(spec.opts);
        let mode = self.config.dir_mode;

        if spec.opts.force {
            for dir in ancestors_below_root(&self.config.cgroup_root, &paths.parent) {
                cgfs.ensure_directory(&dir, mode)?;
            }
            enable_controllers(&mut cgfs, &paths.parent, &self.config.controller_list())?;
            progress!(spec.opts, "parent ready: {:?}", paths.parent);
        }

        cgfs.ensure_directory(&paths.cgroup, mode)?;
        progress!(spec.opts, "cgroup ready: {:?}", paths.cgroup);

        if !spec.attach_only {
            CpuController::apply(&mut cgfs, &paths.cgroup, spec.cpu.as_ref())?;
            MemoryController::apply(&mut cgfs, &paths.cgroup, spec.memory_max)?;
            IoController::apply(&mut cgfs, &paths.cgroup, &spec.io_max)?;
            progress!(spec.opts, "limits applied: {:?}", paths.cgroup);
        }

        if let Some(pid) = spec.pid {
            procs::attach(&mut cgfs, &paths.cgroup, pid)?;
        }

        let outcome = if spec.attach_only {
            Outcome::Attached
        } else {
            Outcome::Applied
        };
        Ok(self.report(paths.cgroup, outcome, cgfs))
    }

    fn report(&self, cgroup: PathBuf, outcome: Outcome, cgfs: CgroupFs) -> ApplyReport {
        ApplyReport {
            cgroup,
            outcome,
            dry_run: cgfs.opts().dry_run,
            actions: cgfs.into_actions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct FakeHost {
        cgroup_v2: bool,
        privileged: bool,
    }

    impl Host for FakeHost {
        fn has_cgroup_v2(&self, _root: &Path) -> bool {
            self.cgroup_v2
        }

        fn is_privileged(&self) -> bool {
            self.privileged
        }
    }

    fn manager(cgroup_v2: bool, privileged: bool) -> CgroupManager<FakeHost> {
        CgroupManager::with_host(
            EngineConfig::default(),
            FakeHost {
                cgroup_v2,
                privileged,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_dry_run_end_to_end_plan() {
        let spec = LimitSpec::new("plimit/1234")
            .with_pid(1234)
            .with_cpu_percent(50)
            .with_memory_max(536_870_912)
            .dry_run();

        let report = manager(true, true).apply(&spec).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.outcome, Outcome::Applied);
        assert_eq!(report.cgroup, PathBuf::from("/sys/fs/cgroup/plimit/1234"));
        assert_eq!(
            report.actions,
            vec![
                Action::EnsureDir {
                    path: PathBuf::from("/sys/fs/cgroup/plimit/1234"),
                    mode: 0o755
                },
                Action::Write {
                    path: PathBuf::from("/sys/fs/cgroup/plimit/1234/cpu.max"),
                    value: "50000 100000".to_string()
                },
                Action::Write {
                    path: PathBuf::from("/sys/fs/cgroup/plimit/1234/memory.max"),
                    value: "536870912".to_string()
                },
                Action::Write {
                    path: PathBuf::from("/sys/fs/cgroup/plimit/1234/cgroup.procs"),
                    value: "1234".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_force_enables_parent_before_child() {
        let spec = LimitSpec::new("a/b/job")
            .with_pid(7)
            .with_cpu_percent(10)
            .force()
            .dry_run();

        let report = manager(true, true).apply(&spec).unwrap();

        let paths: Vec<&Path> = report.actions.iter().map(Action::path).collect();
        assert_eq!(
            paths,
            vec![
                Path::new("/sys/fs/cgroup/a"),
                Path::new("/sys/fs/cgroup/a/b"),
                Path::new("/sys/fs/cgroup/a/b/cgroup.subtree_control"),
                Path::new("/sys/fs/cgroup/a/b/job"),
                Path::new("/sys/fs/cgroup/a/b/job/cpu.max"),
                Path::new("/sys/fs/cgroup/a/b/job/cgroup.procs"),
            ]
        );
        assert_eq!(
            report.actions[2],
            Action::Write {
                path: PathBuf::from("/sys/fs/cgroup/a/b/cgroup.subtree_control"),
                value: "+cpu +memory +io".to_string()
            }
        );
    }

    #[test]
    fn test_attach_only_skips_limits() {
        let spec = LimitSpec::new("plimit/42")
            .with_pid(42)
            .with_cpu_percent(50)
            .with_memory_max(1024)
            .with_io_max("8:0 rbps=1")
            .attach_only()
            .dry_run();

        let report = manager(true, true).apply(&spec).unwrap();

        assert_eq!(report.outcome, Outcome::Attached);
        assert_eq!(report.written_files(), vec!["cgroup.procs"]);
    }

    #[test]
    fn test_delete_targets_exact_path() {
        let spec = LimitSpec::new("foo/bar").delete().dry_run();

        let report = manager(true, true).apply(&spec).unwrap();

        assert_eq!(report.outcome, Outcome::Deleted);
        assert_eq!(
            report.actions,
            vec![Action::RemoveDir {
                path: PathBuf::from("/sys/fs/cgroup/foo/bar")
            }]
        );
    }

    #[test]
    fn test_preconditions_checked_before_mutation() {
        let spec = LimitSpec::new("plimit/1").with_pid(1).dry_run();

        let err = manager(false, true).apply(&spec).unwrap_err();
        assert!(matches!(err, Error::CgroupV2NotAvailable(_)));

        let err = manager(true, false).apply(&spec).unwrap_err();
        assert!(matches!(err, Error::InsufficientPrivileges));

        let err = manager(true, false)
            .apply(&LimitSpec::new("plimit/1").delete())
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientPrivileges));
    }

    #[test]
    fn test_invalid_spec_rejected_before_preconditions() {
        let err = manager(false, false)
            .apply(&LimitSpec::default().with_pid(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = manager(true, true)
            .apply(&LimitSpec::new("../escape").with_pid(1).dry_run())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_repeat_dry_run_is_deterministic() {
        let spec = LimitSpec::new("plimit/9")
            .with_pid(9)
            .with_cpu_percent(33)
            .with_io_max("8:0 wbps=10")
            .force()
            .dry_run();
        let manager = manager(true, true);

        let first = manager.apply(&spec).unwrap();
        let second = manager.apply(&spec).unwrap();
        assert_eq!(first.actions, second.actions);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig::with_root("relative");
        assert!(CgroupManager::new(config).is_err());
    }
}
