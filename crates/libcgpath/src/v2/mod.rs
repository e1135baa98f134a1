//! On a unified hierarchy every controller lives in a single tree, so there are no per
//! controller mount points to resolve against.

use std::path::PathBuf;

use nix::unistd::Pid;

use crate::common::{AnyResolver, CgroupPathResolver};
use crate::config::CgroupConfig;
use crate::v1::cgroup_data::CgroupData;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cgroup v1 path resolution is not applicable to a unified cgroup hierarchy")]
pub struct NotApplicable;

/// Path resolver for hosts running cgroup v2. Declines every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnifiedResolver;

impl UnifiedResolver {
    pub fn any<'a>(self) -> AnyResolver<'a> {
        AnyResolver::Unified(self)
    }
}

impl CgroupPathResolver for UnifiedResolver {
    type Error = NotApplicable;

    fn resolve(&self, _config: &CgroupConfig, _pid: Pid) -> Result<CgroupData, Self::Error> {
        Err(NotApplicable)
    }

    fn subsystem_path<C: AsRef<str>>(
        &self,
        _data: &CgroupData,
        _controller: C,
    ) -> Result<PathBuf, Self::Error> {
        Err(NotApplicable)
    }
}
