use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use nix::{
    sys::statfs::{statfs, CGROUP2_SUPER_MAGIC, CGROUP_SUPER_MAGIC},
    unistd::Pid,
};
use once_cell::sync::OnceCell;
use procfs::process::{MountInfo, Process};
use procfs::ProcError;

use super::controller_type::ControllerType;
use crate::common::{self, ModeDetector, DEFAULT_CGROUP_ROOT};

#[derive(thiserror::Error, Debug)]
pub enum MountPointError {
    #[error("failed to read process info from /proc/self: {0}")]
    ReadSelf(ProcError),
    #[error("failed to read process info of {pid}: {err}")]
    ReadProcess { pid: Pid, err: ProcError },
    #[error("failed to get mountinfo: {0}")]
    MountInfo(ProcError),
    #[error("could not find mountpoint for {subsystem}")]
    NotFound { subsystem: String },
    #[error("no cgroup v1 hierarchy is mounted")]
    NoHierarchy,
}

/// A cgroup v1 hierarchy as it appears in the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupMount {
    pub mount_point: PathBuf,
    /// Mount and superblock options. Controllers attached to the hierarchy
    /// show up here next to generic options like `rw` or `seclabel`, named
    /// hierarchies as `name=<name>`.
    pub options: Vec<String>,
}

/// Where the mount table is read from.
#[cfg_attr(test, automock)]
pub trait MountSource: Send + Sync {
    /// All `cgroup` mounts in mount table order
    fn cgroup_mounts(&self) -> Result<Vec<CgroupMount>, MountPointError>;
}

/// Reads the mount table of a process from procfs, `/proc/self/mountinfo` by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMountSource {
    pid: Option<Pid>,
}

impl ProcMountSource {
    pub fn for_pid(pid: Pid) -> Self {
        Self { pid: Some(pid) }
    }

    fn process(&self) -> Result<Process, MountPointError> {
        match self.pid {
            Some(pid) => Process::new(pid.as_raw())
                .map_err(|err| MountPointError::ReadProcess { pid, err }),
            None => Process::myself().map_err(MountPointError::ReadSelf),
        }
    }
}

fn options(mount: &MountInfo) -> Vec<String> {
    mount
        .mount_options
        .iter()
        .chain(mount.super_options.iter())
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => key.to_owned(),
        })
        .collect()
}

impl MountSource for ProcMountSource {
    fn cgroup_mounts(&self) -> Result<Vec<CgroupMount>, MountPointError> {
        Ok(self
            .process()?
            .mountinfo()
            .map_err(MountPointError::MountInfo)?
            .into_iter()
            .filter(|m| m.fs_type == "cgroup")
            .map(|m| CgroupMount {
                options: options(&m),
                mount_point: m.mount_point,
            })
            .collect())
    }
}

/// Mount point of a single controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub controller: String,
    pub path: PathBuf,
}

// v1 controllers the kernel knows about beyond the catalogue
const OTHER_CONTROLLERS: &[&str] = &["rdma", "misc", "debug"];

fn names_hierarchy(option: &str) -> bool {
    if let Some(name) = option.strip_prefix("name=") {
        return !name.is_empty();
    }

    option.parse::<ControllerType>().is_ok() || OTHER_CONTROLLERS.contains(&option)
}

#[derive(Debug, Default)]
struct MountTable {
    controllers: HashMap<String, MountPoint>,
    first: Option<PathBuf>,
}

impl MountTable {
    fn index(mounts: Vec<CgroupMount>) -> Self {
        let mut table = MountTable::default();
        for mount in mounts {
            if table.first.is_none() {
                table.first = Some(mount.mount_point.clone());
            }

            for option in mount.options.into_iter().filter(|o| names_hierarchy(o)) {
                // the same hierarchy can be mounted more than once, the first mount wins
                table
                    .controllers
                    .entry(option.clone())
                    .or_insert_with(|| MountPoint {
                        controller: option,
                        path: mount.mount_point.clone(),
                    });
            }
        }
        table
    }
}

/// Knows where every cgroup v1 controller is mounted. The mount table is scanned once, on
/// first use, and answered from memory afterwards. Concurrent first users share a single
/// scan. A failed scan is not remembered.
pub struct MountRegistry {
    source: Box<dyn MountSource>,
    table: OnceCell<MountTable>,
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::with_source(ProcMountSource::default())
    }
}

impl MountRegistry {
    /// Registry for the mount namespace of the current process
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for the mount namespace of `pid`
    pub fn for_pid(pid: Pid) -> Self {
        Self::with_source(ProcMountSource::for_pid(pid))
    }

    pub fn with_source<S: MountSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            table: OnceCell::new(),
        }
    }

    fn table(&self) -> Result<&MountTable, MountPointError> {
        self.table.get_or_try_init(|| {
            let mounts = self.source.cgroup_mounts()?;
            tracing::debug!(count = mounts.len(), "scanned cgroup v1 mounts");
            Ok(MountTable::index(mounts))
        })
    }

    /// Finds the mount point of a controller or named hierarchy (`name=systemd`)
    pub fn find<C: AsRef<str>>(&self, controller: C) -> Result<&MountPoint, MountPointError> {
        let controller = controller.as_ref();
        self.table()?
            .controllers
            .get(controller)
            .ok_or_else(|| MountPointError::NotFound {
                subsystem: controller.to_owned(),
            })
    }

    /// Mount points of everything that is mounted, keyed by controller
    pub fn mount_points(&self) -> Result<&HashMap<String, MountPoint>, MountPointError> {
        Ok(&self.table()?.controllers)
    }

    /// Directory holding the controller hierarchies, usually /sys/fs/cgroup. The default root
    /// is preferred, otherwise the parent of the first cgroup mount is used.
    pub fn cgroup_root(&self) -> Result<PathBuf, MountPointError> {
        if let Some(root) = try_default_root() {
            return Ok(root);
        }

        self.scanned_root()
    }

    fn scanned_root(&self) -> Result<PathBuf, MountPointError> {
        self.table()?
            .first
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or(MountPointError::NoHierarchy)
    }

    /// Drops the cached mount table, the next lookup scans again
    pub fn reset(&mut self) {
        self.table.take();
    }
}

/// Returns the default cgroup root if a cgroup v1 hierarchy is mounted below it.
pub fn try_default_root() -> Option<PathBuf> {
    try_default_root_with(Path::new(DEFAULT_CGROUP_ROOT), common::mode_detector())
}

/// Returns `root` if it holds cgroup v1 hierarchies. This only inspects the file system and
/// never touches the cache of a [`MountRegistry`].
pub fn try_default_root_with(root: &Path, detector: &ModeDetector) -> Option<PathBuf> {
    if detector.is_unified_mode() {
        return None;
    }

    let stat = statfs(root).ok()?;
    if stat.filesystem_type() == CGROUP2_SUPER_MAGIC || stat.filesystem_type() == CGROUP_SUPER_MAGIC
    {
        return None;
    }

    let has_hierarchy = fs::read_dir(root)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .any(|entry| {
            statfs(&entry.path())
                .map(|stat| stat.filesystem_type() == CGROUP_SUPER_MAGIC)
                .unwrap_or(false)
        });

    if has_hierarchy {
        Some(root.to_path_buf())
    } else {
        None
    }
}
