//! Cgroup v2 orchestration
//!
//! Creates cgroups under a configured root, enables controllers on the
//! parent, writes `cpu.max` / `memory.max` / `io.max` and moves a process
//! into the cgroup through `cgroup.procs`.
//!
//! # Caveats
//! - cgroup v1 is not supported
//! - Nothing is rolled back when a step fails
//! - Concurrent invocations are not locked against each other

/// Progress message: info when the request is verbose, debug otherwise
macro_rules! progress {
    ($opts:expr, $($arg:tt)+) => {
        if $opts.verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod controller;
pub mod fs;
pub mod manager;
pub mod path;
pub mod procs;
pub mod types;

pub use controller::{convert_percent_to_quota, CpuController, IoController, MemoryController};
pub use fs::{Action, CgroupFs};
pub use manager::{ApplyReport, CgroupManager, Outcome};
pub use path::{resolve, CgroupPaths};
pub use types::{CpuLimit, LimitSpec, RunOptions, CPU_PERIOD_US};
