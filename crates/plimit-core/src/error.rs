use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cgroup error: {0}")]
    Cgroup(String),

    #[error("Cgroup v2 not available (missing {0:?})")]
    CgroupV2NotAvailable(PathBuf),

    #[error("Insufficient privileges (need root or CAP_SYS_ADMIN)")]
    InsufficientPrivileges,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify an I/O failure on `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("{:?}", path)),
            io::ErrorKind::PermissionDenied => {
                Error::PermissionDenied(format!("{:?}: {}", path, err))
            }
            _ => Error::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InvalidArgument(_) => 2,
            Error::PermissionDenied(_) | Error::InsufficientPrivileges => 3,
            Error::NotFound(_) | Error::CgroupV2NotAvailable(_) => 4,
            Error::Io { .. } => 6,
            Error::Parse(_) => 8,
            Error::Cgroup(_) => 9,
        }
    }
}
