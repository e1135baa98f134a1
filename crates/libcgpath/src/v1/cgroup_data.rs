use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use crate::config::{CgroupConfig, CgroupLocation, ConfigError};
use crate::utils::PathBufExt;

/// Canonical location of a container's cgroup, relative to the mount point of any
/// controller hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupData {
    inner_path: PathBuf,
    config: CgroupConfig,
    pid: Pid,
}

impl CgroupData {
    /// Sanitized path below the controller mount points. Always relative and never
    /// starts with a parent reference. Empty for the root cgroup.
    pub fn inner_path(&self) -> &Path {
        &self.inner_path
    }

    pub fn config(&self) -> &CgroupConfig {
        &self.config
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Bypasses sanitization to exercise the containment checks
    #[cfg(test)]
    pub(crate) fn unsanitized<P: Into<PathBuf>>(inner_path: P) -> Self {
        Self {
            inner_path: inner_path.into(),
            config: CgroupConfig::default(),
            pid: Pid::from_raw(0),
        }
    }
}

/// Resolves a cgroup configuration into its canonical inner path. Does not access the
/// file system, so this can be used before any controller has been discovered.
///
/// Legacy configurations have `parent` and `name` cleaned independently before they are
/// joined. Otherwise parent references in `name` could consume segments of `parent`.
pub fn resolve(config: &CgroupConfig, pid: Pid) -> Result<CgroupData, ConfigError> {
    let inner_path = match config.location()? {
        CgroupLocation::Path(path) => Path::new(path).clean_rooted(),
        CgroupLocation::Legacy { parent, name } => {
            let mut inner_path = Path::new(parent).clean_rooted();
            let name = Path::new(name).clean_rooted();
            if !name.as_os_str().is_empty() {
                inner_path.push(name);
            }
            inner_path
        }
    };

    tracing::debug!(?config, ?inner_path, %pid, "resolved cgroup inner path");
    Ok(CgroupData {
        inner_path,
        config: config.clone(),
        pid,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Component;

    use super::*;

    const ESCAPE: &str = "../../../../../../../../../../some/path";
    const ABSOLUTE_ESCAPE: &str = "/../../../../../../../../../../some/path";

    fn assert_not_escaping(data: &CgroupData) {
        assert!(data.inner_path().is_relative());
        assert!(
            !data
                .inner_path()
                .components()
                .any(|c| matches!(c, Component::ParentDir)),
            "SECURITY: inner path {:?} is outside of the cgroup mountpoint",
            data.inner_path()
        );
    }

    #[test]
    fn test_invalid_cgroup_path() {
        for path in [ESCAPE, ABSOLUTE_ESCAPE] {
            let data = resolve(&CgroupConfig::with_path(path), Pid::from_raw(0)).unwrap();
            assert_not_escaping(&data);
            assert_eq!(data.inner_path(), Path::new("some/path"));
        }
    }

    #[test]
    fn test_invalid_cgroup_parent() {
        for parent in [ESCAPE, ABSOLUTE_ESCAPE] {
            let data = resolve(&CgroupConfig::legacy(parent, "name"), Pid::from_raw(0)).unwrap();
            assert_not_escaping(&data);
            assert_eq!(data.inner_path(), Path::new("some/path/name"));
        }
    }

    #[test]
    fn test_invalid_cgroup_name() {
        for name in [ESCAPE, ABSOLUTE_ESCAPE] {
            let data = resolve(&CgroupConfig::legacy("parent", name), Pid::from_raw(0)).unwrap();
            assert_not_escaping(&data);
            // the name must not climb out of the parent
            assert_eq!(data.inner_path(), Path::new("parent/some/path"));
        }
    }

    #[test]
    fn test_invalid_cgroup_name_and_parent() {
        for path in [ESCAPE, ABSOLUTE_ESCAPE] {
            let data = resolve(&CgroupConfig::legacy(path, path), Pid::from_raw(0)).unwrap();
            assert_not_escaping(&data);
            assert_eq!(data.inner_path(), Path::new("some/path/some/path"));
        }
    }

    #[test]
    fn test_path_takes_priority_over_legacy_fields() {
        let config = CgroupConfig {
            path: "/container".into(),
            parent: "parent".into(),
            name: "name".into(),
        };
        let data = resolve(&config, Pid::from_raw(42)).unwrap();

        assert_eq!(data.inner_path(), Path::new("container"));
        assert_eq!(data.config(), &config);
        assert_eq!(data.pid(), Pid::from_raw(42));
    }

    #[test]
    fn test_legacy_with_single_field() {
        let data = resolve(&CgroupConfig::legacy("", "name"), Pid::from_raw(0)).unwrap();
        assert_eq!(data.inner_path(), Path::new("name"));

        let data = resolve(&CgroupConfig::legacy("/parent/", ""), Pid::from_raw(0)).unwrap();
        assert_eq!(data.inner_path().as_os_str(), "parent");
    }

    #[test]
    fn test_root_cgroup() {
        for path in ["/", "..", "/a/.."] {
            let data = resolve(&CgroupConfig::with_path(path), Pid::from_raw(0)).unwrap();
            assert_eq!(data.inner_path().as_os_str(), "");
        }
    }

    #[test]
    fn test_missing_path() {
        assert_eq!(
            resolve(&CgroupConfig::default(), Pid::from_raw(0)),
            Err(ConfigError::MissingPath)
        );
    }
}
