//! plimit Core Library
//!
//! Applies CPU, memory and I/O limits to a running process through the
//! cgroup v2 hierarchy.

pub mod cgroups;
pub mod config;
pub mod error;
pub mod host;
pub mod parse;

pub use cgroups::{
    Action, ApplyReport, CgroupManager, CgroupPaths, CpuLimit, LimitSpec, Outcome, RunOptions,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use host::{Host, SystemHost};
pub use parse::{parse_byte_size, parse_integer};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
