use std::path::PathBuf;

use super::cgroup_data::CgroupData;
use super::mount::{MountPointError, MountRegistry};
use crate::utils::{PathBufExt, PathEscapeError};

#[derive(thiserror::Error, Debug)]
pub enum SubsystemPathError {
    #[error(transparent)]
    MountPoint(#[from] MountPointError),
    #[error("SECURITY: cgroup path is outside of the cgroup mountpoint: {0}")]
    Escape(#[from] PathEscapeError),
}

impl SubsystemPathError {
    /// The controller is not mounted on this host. Callers may skip it.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SubsystemPathError::MountPoint(MountPointError::NotFound { .. })
        )
    }
}

/// Returns the directory of the cgroup in the hierarchy of `controller`. The result is
/// checked to be located below the mount point of the controller, anything else is
/// refused.
pub fn subsystem_path<C: AsRef<str>>(
    registry: &MountRegistry,
    data: &CgroupData,
    controller: C,
) -> Result<PathBuf, SubsystemPathError> {
    let controller = controller.as_ref();
    let mount_point = registry.find(controller)?;
    let path = mount_point.path.join_contained(data.inner_path())?;

    tracing::debug!(controller, ?path, "resolved cgroup subsystem path");
    Ok(path)
}
