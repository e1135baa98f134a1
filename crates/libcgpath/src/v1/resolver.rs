use std::collections::HashMap;
use std::path::PathBuf;

use nix::unistd::Pid;

use super::{
    cgroup_data::{self, CgroupData},
    controller_type::CONTROLLERS,
    mount::MountRegistry,
    path::{self, SubsystemPathError},
    ControllerType,
};
use crate::common::{AnyResolver, CgroupPathResolver};
use crate::config::{CgroupConfig, ConfigError};

#[derive(thiserror::Error, Debug)]
pub enum V1ResolverError {
    #[error("invalid cgroup config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    SubsystemPath(#[from] SubsystemPathError),
}

/// Resolves cgroup paths on hosts that use cgroup v1 hierarchies.
pub struct Resolver<'a> {
    registry: &'a MountRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a MountRegistry) -> Self {
        Self { registry }
    }

    pub fn any(self) -> AnyResolver<'a> {
        AnyResolver::V1(self)
    }

    /// Resolves the path of the cgroup for every supported controller. Controllers that
    /// are not mounted on this host are left out.
    pub fn subsystem_paths(
        &self,
        data: &CgroupData,
    ) -> Result<HashMap<ControllerType, PathBuf>, V1ResolverError> {
        let mut paths = HashMap::with_capacity(CONTROLLERS.len());
        for controller in CONTROLLERS {
            match path::subsystem_path(self.registry, data, controller) {
                Ok(path) => {
                    paths.insert(*controller, path);
                }
                Err(err) if err.is_not_found() => {
                    tracing::warn!("cgroup {} not supported on this system", controller);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(paths)
    }
}

impl CgroupPathResolver for Resolver<'_> {
    type Error = V1ResolverError;

    fn resolve(&self, config: &CgroupConfig, pid: Pid) -> Result<CgroupData, Self::Error> {
        Ok(cgroup_data::resolve(config, pid)?)
    }

    fn subsystem_path<C: AsRef<str>>(
        &self,
        data: &CgroupData,
        controller: C,
    ) -> Result<PathBuf, Self::Error> {
        Ok(path::subsystem_path(self.registry, data, controller)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;

    use super::*;
    use crate::common::{self, CgroupSetup, ModeDetector};
    use crate::test::{fixture_registry, V1_MOUNTS};
    use crate::v1::mount::MountPointError;

    #[test]
    fn test_resolve_and_build() -> Result<()> {
        let registry = fixture_registry(V1_MOUNTS);
        let resolver = Resolver::new(&registry);

        let data =
            resolver.resolve(&CgroupConfig::legacy("/kubepods", "pod1"), Pid::from_raw(1))?;
        assert_eq!(
            resolver.subsystem_path(&data, ControllerType::Memory)?,
            Path::new("/sys/fs/cgroup/memory/kubepods/pod1")
        );
        assert_eq!(
            resolver.subsystem_path(&data, "cpuacct")?,
            Path::new("/sys/fs/cgroup/cpu,cpuacct/kubepods/pod1")
        );
        Ok(())
    }

    #[test]
    fn test_missing_config() {
        let registry = fixture_registry(V1_MOUNTS);
        let resolver = Resolver::new(&registry);

        assert!(matches!(
            resolver.resolve(&CgroupConfig::default(), Pid::from_raw(1)),
            Err(V1ResolverError::Config(ConfigError::MissingPath))
        ));
    }

    #[test]
    fn test_subsystem_paths_skips_missing_controllers() -> Result<()> {
        let registry = fixture_registry(V1_MOUNTS);
        let resolver = Resolver::new(&registry);
        let data =
            resolver.resolve(&CgroupConfig::with_path("../../container"), Pid::from_raw(1))?;

        let paths = resolver.subsystem_paths(&data)?;
        for missing in [
            ControllerType::HugeTlb,
            ControllerType::PerfEvent,
            ControllerType::Blkio,
        ] {
            assert!(!paths.contains_key(&missing));
        }
        assert_eq!(paths.len(), CONTROLLERS.len() - 3);
        assert_eq!(
            paths[&ControllerType::NetworkPriority],
            Path::new("/sys/fs/cgroup/net_cls,net_prio/container")
        );
        for (controller, path) in &paths {
            let mount_point = registry.find(controller)?;
            assert!(path.starts_with(&mount_point.path));
        }
        Ok(())
    }

    #[test]
    fn test_subsystem_paths_propagates_scan_failure() {
        let mut source = crate::v1::mount::MockMountSource::new();
        source
            .expect_cgroup_mounts()
            .returning(|| Err(MountPointError::NoHierarchy));
        let registry = MountRegistry::with_source(source);
        let resolver = Resolver::new(&registry);
        let data = resolver
            .resolve(&CgroupConfig::with_path("container"), Pid::from_raw(1))
            .unwrap();

        assert!(matches!(
            resolver.subsystem_paths(&data),
            Err(V1ResolverError::SubsystemPath(SubsystemPathError::MountPoint(
                MountPointError::NoHierarchy
            )))
        ));
    }

    // Runs against the mounts of the test process, there is nothing to check on hosts
    // without a devices hierarchy.
    #[test]
    fn test_invalid_cgroup_path_on_host() -> Result<()> {
        if common::is_unified_mode() {
            return Ok(());
        }

        let registry = MountRegistry::new();
        let device_root = match registry.find("devices") {
            Ok(mount_point) => mount_point.path.clone(),
            Err(_) => return Ok(()),
        };
        let detector = ModeDetector::fixed(CgroupSetup::Legacy);
        let resolver = common::create_resolver(&detector, &registry);

        for path in [
            "../../../../../../../../../../some/path",
            "/../../../../../../../../../../some/path",
        ] {
            let data = resolver.resolve(&CgroupConfig::with_path(path), Pid::from_raw(0))?;
            let device_path = resolver.subsystem_path(&data, "devices")?;
            assert_eq!(device_path, device_root.join("some/path"));
        }
        Ok(())
    }
}
