//! Process membership through `cgroup.procs`

use std::path::Path;

use super::controller::write_controller;
use super::fs::{read_text, CgroupFs};
use crate::Result;

pub const CGROUP_PROCS: &str = "cgroup.procs";

/// Move `pid` into the cgroup at `cgroup_path`.
///
/// The kernel decides whether the move is legal (e.g. no internal processes
/// next to child cgroups with controllers); its refusal is returned as is.
pub fn attach(cgfs: &mut CgroupFs, cgroup_path: &Path, pid: u32) -> Result<()> {
    write_controller(cgfs, cgroup_path, CGROUP_PROCS, &pid.to_string())?;
    progress!(cgfs.opts(), "ACTION: move PID | PATH: {:?} | PID: {}", cgroup_path, pid);
    Ok(())
}

/// PIDs currently in the cgroup, in kernel order
pub fn list(cgroup_path: &Path) -> Result<Vec<String>> {
    let content = read_text(&cgroup_path.join(CGROUP_PROCS))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Truncate `cgroup.procs`
pub fn clear(cgfs: &mut CgroupFs, cgroup_path: &Path) -> Result<()> {
    write_controller(cgfs, cgroup_path, CGROUP_PROCS, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroups::types::RunOptions;
    use crate::Error;
    use std::fs;

    #[test]
    fn test_attach_writes_decimal_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cgfs = CgroupFs::new(RunOptions::default());

        attach(&mut cgfs, dir.path(), 4321).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join(CGROUP_PROCS)).unwrap(),
            "4321"
        );
    }

    #[test]
    fn test_list_preserves_file_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CGROUP_PROCS), "812\n17\n 9001 \n").unwrap();

        assert_eq!(list(dir.path()).unwrap(), vec!["812", "17", "9001"]);
    }

    #[test]
    fn test_list_empty_cgroup() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CGROUP_PROCS), "").unwrap();

        assert!(list(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_cgroup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = list(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_clear_truncates() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CGROUP_PROCS), "1\n2\n").unwrap();
        let mut cgfs = CgroupFs::new(RunOptions::default());

        clear(&mut cgfs, dir.path()).unwrap();

        assert!(list(dir.path()).unwrap().is_empty());
    }
}
