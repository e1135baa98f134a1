use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use nix::{
    sys::statfs::{statfs, CGROUP2_SUPER_MAGIC, TMPFS_MAGIC},
    unistd::Pid,
};
use once_cell::sync::{Lazy, OnceCell};

use super::config::CgroupConfig;
use super::v1::{self, cgroup_data::CgroupData, mount::MountRegistry};
use super::v2;

pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

pub trait CgroupPathResolver {
    type Error;

    /// Turns the configuration into the canonical location of the cgroup
    fn resolve(&self, config: &CgroupConfig, pid: Pid) -> Result<CgroupData, Self::Error>;

    /// Absolute path of the cgroup in the hierarchy of the given controller
    fn subsystem_path<C: AsRef<str>>(
        &self,
        data: &CgroupData,
        controller: C,
    ) -> Result<PathBuf, Self::Error>;
}

#[derive(thiserror::Error, Debug)]
pub enum AnyResolverError {
    #[error(transparent)]
    V1(#[from] v1::resolver::V1ResolverError),
    #[error(transparent)]
    NotApplicable(#[from] v2::NotApplicable),
}

impl AnyResolverError {
    /// The host runs a unified hierarchy. This is not a failure of the request itself.
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, AnyResolverError::NotApplicable(_))
    }
}

pub enum AnyResolver<'a> {
    V1(v1::resolver::Resolver<'a>),
    Unified(v2::UnifiedResolver),
}

impl CgroupPathResolver for AnyResolver<'_> {
    type Error = AnyResolverError;

    fn resolve(&self, config: &CgroupConfig, pid: Pid) -> Result<CgroupData, Self::Error> {
        match self {
            AnyResolver::V1(r) => Ok(r.resolve(config, pid)?),
            AnyResolver::Unified(r) => Ok(r.resolve(config, pid)?),
        }
    }

    fn subsystem_path<C: AsRef<str>>(
        &self,
        data: &CgroupData,
        controller: C,
    ) -> Result<PathBuf, Self::Error> {
        match self {
            AnyResolver::V1(r) => Ok(r.subsystem_path(data, controller)?),
            AnyResolver::Unified(r) => Ok(r.subsystem_path(data, controller)?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupSetup {
    Hybrid,
    Legacy,
    Unified,
}

impl Display for CgroupSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let print = match self {
            CgroupSetup::Hybrid => "hybrid",
            CgroupSetup::Legacy => "legacy",
            CgroupSetup::Unified => "unified",
        };

        write!(f, "{print}")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GetCgroupSetupError {
    #[error("failed to statfs {path:?}: {err}")]
    Statfs { path: PathBuf, err: nix::Error },
    #[error("cgroup root {0:?} does not exist")]
    NonExistent(PathBuf),
    #[error("failed to detect cgroup setup")]
    FailedToDetect,
}

/// Determines the cgroup setup of the system. Systems typically have one of
/// three setups:
/// - Unified: Pure cgroup v2 system.
/// - Legacy: Pure cgroup v1 system.
/// - Hybrid: Hybrid is basically a cgroup v1 system, except for
///   an additional unified hierarchy which doesn't have any
///   controllers attached. Resource control can purely be achieved
///   through the cgroup v1 hierarchy, not through the cgroup v2 hierarchy.
pub fn get_cgroup_setup_with_root(root_path: &Path) -> Result<CgroupSetup, GetCgroupSetupError> {
    if !root_path.exists() {
        return Err(GetCgroupSetupError::NonExistent(root_path.to_path_buf()));
    }

    // If the filesystem is of type cgroup2, the system is in unified mode.
    // If the filesystem is tmpfs instead the system is either in legacy or
    // hybrid mode. If a cgroup2 filesystem has been mounted under the "unified"
    // folder we are in hybrid mode, otherwise we are in legacy mode.
    let stat = statfs(root_path).map_err(|err| GetCgroupSetupError::Statfs {
        path: root_path.to_path_buf(),
        err,
    })?;
    if stat.filesystem_type() == CGROUP2_SUPER_MAGIC {
        return Ok(CgroupSetup::Unified);
    }

    if stat.filesystem_type() == TMPFS_MAGIC {
        let unified = root_path.join("unified");
        if unified.exists() {
            let stat = statfs(&unified).map_err(|err| GetCgroupSetupError::Statfs {
                path: unified.clone(),
                err,
            })?;
            if stat.filesystem_type() == CGROUP2_SUPER_MAGIC {
                return Ok(CgroupSetup::Hybrid);
            }
        }

        return Ok(CgroupSetup::Legacy);
    }

    Err(GetCgroupSetupError::FailedToDetect)
}

/// Detects the cgroup setup below a cgroup root once and remembers the answer.
#[derive(Debug)]
pub struct ModeDetector {
    root: PathBuf,
    setup: OnceCell<CgroupSetup>,
    unified: OnceCell<bool>,
}

impl Default for ModeDetector {
    fn default() -> Self {
        Self::with_root(DEFAULT_CGROUP_ROOT)
    }
}

impl ModeDetector {
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            setup: OnceCell::new(),
            unified: OnceCell::new(),
        }
    }

    /// Constructs a detector that reports `setup` without looking at the system
    pub fn fixed(setup: CgroupSetup) -> Self {
        let detector = Self::default();
        let _ = detector.setup.set(setup);
        detector
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Failed detections are not remembered and will be retried by the next call.
    pub fn setup(&self) -> Result<CgroupSetup, GetCgroupSetupError> {
        self.setup
            .get_or_try_init(|| {
                let setup = get_cgroup_setup_with_root(&self.root)?;
                tracing::debug!(root = ?self.root, %setup, "detected cgroup setup");
                Ok(setup)
            })
            .copied()
    }

    /// Answered once. If the setup cannot be detected the host is treated as cgroup v1 from
    /// then on.
    pub fn is_unified_mode(&self) -> bool {
        *self.unified.get_or_init(|| match self.setup() {
            Ok(setup) => setup == CgroupSetup::Unified,
            Err(err) => {
                tracing::warn!(
                    root = ?self.root,
                    %err,
                    "could not detect cgroup setup, assuming cgroup v1"
                );
                false
            }
        })
    }
}

static MODE_DETECTOR: Lazy<ModeDetector> = Lazy::new(ModeDetector::default);

/// Process wide detector for the default cgroup root
pub fn mode_detector() -> &'static ModeDetector {
    &MODE_DETECTOR
}

pub fn is_unified_mode() -> bool {
    mode_detector().is_unified_mode()
}

/// Picks the path resolver that matches the cgroup setup reported by `detector`.
pub fn create_resolver<'a>(
    detector: &ModeDetector,
    registry: &'a MountRegistry,
) -> AnyResolver<'a> {
    if detector.is_unified_mode() {
        tracing::info!(
            root = ?detector.root(),
            "unified cgroup hierarchy detected, v1 path resolution is not applicable"
        );
        return v2::UnifiedResolver.any();
    }

    tracing::info!(root = ?detector.root(), "cgroup path resolver V1 will be used");
    v1::resolver::Resolver::new(registry).any()
}
