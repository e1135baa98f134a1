use std::collections::HashMap;
use std::path::PathBuf;

use nix::unistd::Pid;

use super::{cgroup_data::CgroupData, mount::MountRegistry, ControllerType};
use crate::common::{AnyResolver, CgroupPathResolver};
use crate::config::CgroupConfig;

#[derive(thiserror::Error, Debug)]
pub enum V1ResolverError {
    #[error("v1 cgroup feature is required, but was not enabled during compile time")]
    NotEnabled,
}

pub struct Resolver<'a> {
    _registry: &'a MountRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a MountRegistry) -> Self {
        Self {
            _registry: registry,
        }
    }

    pub fn any(self) -> AnyResolver<'a> {
        AnyResolver::V1(self)
    }

    pub fn subsystem_paths(
        &self,
        _data: &CgroupData,
    ) -> Result<HashMap<ControllerType, PathBuf>, V1ResolverError> {
        Err(V1ResolverError::NotEnabled)
    }
}

impl CgroupPathResolver for Resolver<'_> {
    type Error = V1ResolverError;

    fn resolve(&self, _config: &CgroupConfig, _pid: Pid) -> Result<CgroupData, Self::Error> {
        Err(V1ResolverError::NotEnabled)
    }

    fn subsystem_path<C: AsRef<str>>(
        &self,
        _data: &CgroupData,
        _controller: C,
    ) -> Result<PathBuf, Self::Error> {
        Err(V1ResolverError::NotEnabled)
    }
}
