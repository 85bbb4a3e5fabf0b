//! Data types describing one orchestration request

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Period used when converting a percentage to a `cpu.max` pair (100ms)
pub const CPU_PERIOD_US: u64 = 100_000;

/// Runtime switches shared by every filesystem step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Log progress at info level
    pub verbose: bool,
    /// Record and log actions without touching the filesystem
    pub dry_run: bool,
    /// Create missing ancestors and enable controllers on the parent
    pub force: bool,
}

/// CPU limit, in exactly one of its accepted forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuLimit {
    /// Written verbatim to `cpu.max` (e.g. "max" or "50000 100000")
    Raw(String),
    /// Percentage of a single CPU, 1..=100
    Percent(u8),
    /// Explicit quota and period in microseconds
    QuotaPeriod { quota: u64, period: u64 },
}

impl CpuLimit {
    /// Build a CPU limit from the independent command-line fields.
    ///
    /// At most one form may be given; quota and period must come together.
    pub fn from_parts(
        raw: Option<String>,
        percent: Option<i64>,
        quota: Option<i64>,
        period: Option<i64>,
    ) -> Result<Option<Self>> {
        let forms = [raw.is_some(), percent.is_some(), quota.is_some() || period.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if forms > 1 {
            return Err(Error::InvalidArgument(
                "only one of --cpu-max, --cpu-percent or --cpu-quota/--cpu-period may be set"
                    .to_string(),
            ));
        }

        if let Some(raw) = raw {
            return Ok(Some(CpuLimit::Raw(raw)));
        }

        if let Some(percent) = percent {
            if !(1..=100).contains(&percent) {
                return Err(Error::InvalidArgument(format!(
                    "CPU percent must be 1-100, got {}",
                    percent
                )));
            }
            return Ok(Some(CpuLimit::Percent(percent as u8)));
        }

        match (quota, period) {
            (Some(quota), Some(period)) if quota > 0 && period > 0 => {
                Ok(Some(CpuLimit::QuotaPeriod {
                    quota: quota as u64,
                    period: period as u64,
                }))
            }
            (Some(_), Some(_)) => Err(Error::InvalidArgument(
                "--cpu-quota and --cpu-period must both be > 0".to_string(),
            )),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidArgument(
                "both --cpu-quota and --cpu-period are required together".to_string(),
            )),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            CpuLimit::Raw(raw) if raw.trim().is_empty() => Err(Error::InvalidArgument(
                "raw cpu.max value must not be empty".to_string(),
            )),
            CpuLimit::Percent(p) if !(1..=100).contains(p) => Err(Error::InvalidArgument(
                format!("CPU percent must be 1-100, got {}", p),
            )),
            CpuLimit::QuotaPeriod { quota, period } if *quota == 0 || *period == 0 => {
                Err(Error::InvalidArgument(
                    "CPU quota and period must both be > 0".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// A complete, validated description of one orchestration request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSpec {
    /// Process to migrate into the cgroup
    pub pid: Option<u32>,

    /// Cgroup name relative to the configured root
    pub cgname: Option<String>,

    pub cpu: Option<CpuLimit>,

    /// Hard memory limit (bytes)
    pub memory_max: Option<u64>,

    /// `io.max` entries, written in order
    pub io_max: Vec<String>,

    /// Only migrate the process, leave limits untouched
    pub attach_only: bool,

    /// Remove the cgroup instead of creating it
    pub delete: bool,

    pub opts: RunOptions,
}

impl LimitSpec {
    pub fn new(cgname: impl Into<String>) -> Self {
        Self {
            cgname: Some(cgname.into()),
            ..Self::default()
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_cpu(mut self, cpu: CpuLimit) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn with_cpu_percent(self, percent: u8) -> Self {
        self.with_cpu(CpuLimit::Percent(percent))
    }

    pub fn with_memory_max(mut self, bytes: u64) -> Self {
        self.memory_max = Some(bytes);
        self
    }

    pub fn with_io_max(mut self, entry: impl Into<String>) -> Self {
        self.io_max.push(entry.into());
        self
    }

    pub fn attach_only(mut self) -> Self {
        self.attach_only = true;
        self
    }

    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.opts.dry_run = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.opts.force = true;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.opts.verbose = true;
        self
    }

    /// Cgroup name, or an argument error when absent or empty
    pub fn name(&self) -> Result<&str> {
        match self.cgname.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::InvalidArgument("cgroup name is required".to_string())),
        }
    }

    /// Check the request is self-consistent
    pub fn validate(&self) -> Result<()> {
        self.name()?;

        if self.delete && self.attach_only {
            return Err(Error::InvalidArgument(
                "--delete and --attach-only are mutually exclusive".to_string(),
            ));
        }

        if self.pid == Some(0) {
            return Err(Error::InvalidArgument("PID must be > 0".to_string()));
        }

        if self.attach_only && self.pid.is_none() {
            return Err(Error::InvalidArgument(
                "--attach-only requires a PID".to_string(),
            ));
        }

        if let Some(cpu) = &self.cpu {
            cpu.validate()?;
        }

        if self.memory_max == Some(0) {
            return Err(Error::InvalidArgument(
                "Memory max limit cannot be 0".to_string(),
            ));
        }

        if self.io_max.iter().any(|entry| entry.trim().is_empty()) {
            return Err(Error::InvalidArgument(
                "io.max entries must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
