use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Controllers a parent may be asked to delegate to its children.
pub const KNOWN_CONTROLLERS: &[&str] = &[
    "cpu", "memory", "io", "pids", "cpuset", "hugetlb", "rdma", "misc",
];

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mount point of the cgroup v2 hierarchy (default: /sys/fs/cgroup)
    pub cgroup_root: PathBuf,

    /// Parent collection for names without a '/' (default: "plimit")
    pub default_parent: String,

    /// Controllers enabled on the parent when forcing (default: cpu, memory, io)
    pub controllers: Vec<String>,

    /// Mode for directories created by the engine (default: 0o755)
    pub dir_mode: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            default_parent: "plimit".to_string(),
            controllers: vec!["cpu".to_string(), "memory".to_string(), "io".to_string()],
            dir_mode: 0o755,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted somewhere other than /sys/fs/cgroup
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use plimit_core::EngineConfig;
    ///
    /// let config = EngineConfig::load_from_file("/etc/plimit/config.toml").unwrap();
    /// println!("cgroup root: {:?}", config.cgroup_root);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| Error::Parse(format!("invalid config {:?}: {}", path, e)))
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| Error::from_io(path, e))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.cgroup_root.is_absolute() {
            return Err(Error::InvalidArgument(format!(
                "cgroup_root must be absolute, got: {:?}",
                self.cgroup_root
            )));
        }

        if self.default_parent.is_empty()
            || self.default_parent.contains('/')
            || self.default_parent == "."
            || self.default_parent == ".."
        {
            return Err(Error::InvalidArgument(format!(
                "default_parent must be a single path segment, got: '{}'",
                self.default_parent
            )));
        }

        if self.controllers.is_empty() {
            return Err(Error::InvalidArgument(
                "controllers must not be empty".to_string(),
            ));
        }

        if let Some(unknown) = self
            .controllers
            .iter()
            .find(|c| !KNOWN_CONTROLLERS.contains(&c.as_str()))
        {
            return Err(Error::InvalidArgument(format!(
                "unknown controller: '{}'",
                unknown
            )));
        }

        if self.dir_mode > 0o7777 {
            return Err(Error::InvalidArgument(format!(
                "dir_mode out of range: {:o}",
                self.dir_mode
            )));
        }

        Ok(())
    }

    /// Activation list written to `cgroup.subtree_control`, e.g. "+cpu +memory +io"
    pub fn controller_list(&self) -> String {
        self.controllers
            .iter()
            .map(|c| format!("+{}", c))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Path of the file whose presence signals a cgroup v2 mount
    pub fn controllers_file(&self) -> PathBuf {
        self.cgroup_root.join("cgroup.controllers")
    }
}
