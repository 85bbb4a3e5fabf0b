//! Controller file writes: enabling, CPU, memory and I/O limits

use std::path::Path;

use super::fs::CgroupFs;
use super::types::{CpuLimit, CPU_PERIOD_US};
use crate::Result;

pub const CPU_MAX: &str = "cpu.max";
pub const MEMORY_MAX: &str = "memory.max";
pub const IO_MAX: &str = "io.max";
pub const SUBTREE_CONTROL: &str = "cgroup.subtree_control";

/// Write `value` to `{cgroup_path}/{file}`
pub fn write_controller(cgfs: &mut CgroupFs, cgroup_path: &Path, file: &str, value: &str) -> Result<()> {
    progress!(
        cgfs.opts(),
        "ACTION: write controller | PATH: {:?} | FILE: '{}' | VALUE: '{}'",
        cgroup_path,
        file,
        value
    );
    cgfs.write_text(&cgroup_path.join(file), value)
}

/// Enable controllers for the children of `parent`.
///
/// `list` is the activation string, e.g. "+cpu +memory +io". The kernel only
/// exposes `cpu.max`/`memory.max`/`io.max` in a child once this has run.
pub fn enable_controllers(cgfs: &mut CgroupFs, parent: &Path, list: &str) -> Result<()> {
    write_controller(cgfs, parent, SUBTREE_CONTROL, list)?;
    progress!(
        cgfs.opts(),
        "ACTION: controllers enabled | PATH: {:?} | CONTROLLERS: '{}'",
        parent,
        list
    );
    Ok(())
}

/// Convert a percentage of one CPU to a (quota, period) pair in microseconds
///
/// - 30% -> (30000, 100000)
/// - 100% -> (100000, 100000)
pub fn convert_percent_to_quota(percent: u8) -> (u64, u64) {
    (CPU_PERIOD_US * u64::from(percent) / 100, CPU_PERIOD_US)
}

/// CPU controller operations
pub struct CpuController;

impl CpuController {
    /// Value written to `cpu.max` for `limit`
    pub fn max_value(limit: &CpuLimit) -> String {
        match limit {
            CpuLimit::Raw(raw) => raw.clone(),
            CpuLimit::Percent(percent) => {
                let (quota, period) = convert_percent_to_quota(*percent);
                format!("{} {}", quota, period)
            }
            CpuLimit::QuotaPeriod { quota, period } => format!("{} {}", quota, period),
        }
    }

    /// Write `cpu.max`; an unset limit leaves the file untouched
    pub fn apply(cgfs: &mut CgroupFs, cgroup_path: &Path, limit: Option<&CpuLimit>) -> Result<()> {
        match limit {
            Some(limit) => write_controller(cgfs, cgroup_path, CPU_MAX, &Self::max_value(limit)),
            None => Ok(()),
        }
    }
}

/// Memory controller operations
pub struct MemoryController;

impl MemoryController {
    /// Set hard memory limit
    ///
    /// The process is OOM-killed if it exceeds this limit.
    pub fn apply(cgfs: &mut CgroupFs, cgroup_path: &Path, bytes: Option<u64>) -> Result<()> {
        match bytes {
            Some(bytes) => write_controller(cgfs, cgroup_path, MEMORY_MAX, &bytes.to_string()),
            None => Ok(()),
        }
    }
}

/// I/O controller operations
pub struct IoController;

impl IoController {
    /// Write each `io.max` entry in order, stopping at the first failure.
    ///
    /// Entries are passed through unparsed ("MAJ:MIN rbps=... wiops=...").
    pub fn apply(cgfs: &mut CgroupFs, cgroup_path: &Path, entries: &[String]) -> Result<()> {
        for entry in entries {
            write_controller(cgfs, cgroup_path, IO_MAX, entry)?;
        }
        Ok(())
    }
}
