use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cgroup config specifies neither a path nor a parent and name")]
    MissingPath,
}

/// Location of a container's cgroup as it is found in the container configuration.
///
/// `path` is the preferred field. Older configurations split the location into `parent`
/// and `name` instead, which is still accepted. When `path` is set the legacy fields are
/// ignored.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CgroupConfig {
    pub path: String,
    pub parent: String,
    pub name: String,
}

/// The shape a [`CgroupConfig`] has been validated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupLocation<'a> {
    Path(&'a str),
    Legacy { parent: &'a str, name: &'a str },
}

impl CgroupConfig {
    pub fn with_path<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn legacy<P: Into<String>, N: Into<String>>(parent: P, name: N) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn location(&self) -> Result<CgroupLocation<'_>, ConfigError> {
        if !self.path.is_empty() {
            return Ok(CgroupLocation::Path(&self.path));
        }

        if !self.parent.is_empty() || !self.name.is_empty() {
            return Ok(CgroupLocation::Legacy {
                parent: &self.parent,
                name: &self.name,
            });
        }

        Err(ConfigError::MissingPath)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn test_path_takes_priority() {
        let config = CgroupConfig {
            path: "/container".into(),
            parent: "parent".into(),
            name: "name".into(),
        };

        assert_eq!(config.location(), Ok(CgroupLocation::Path("/container")));
    }

    #[test]
    fn test_legacy_location() {
        assert_eq!(
            CgroupConfig::legacy("parent", "name").location(),
            Ok(CgroupLocation::Legacy {
                parent: "parent",
                name: "name"
            })
        );
        assert_eq!(
            CgroupConfig::legacy("", "name").location(),
            Ok(CgroupLocation::Legacy {
                parent: "",
                name: "name"
            })
        );
        assert_eq!(
            CgroupConfig::legacy("parent", "").location(),
            Ok(CgroupLocation::Legacy {
                parent: "parent",
                name: ""
            })
        );
    }

    #[test]
    fn test_missing_path() {
        assert_eq!(
            CgroupConfig::default().location(),
            Err(ConfigError::MissingPath)
        );
    }

    #[test]
    fn test_deserialize_partial_config() -> Result<()> {
        let config: CgroupConfig = serde_json::from_str(r#"{"path": "/some/path"}"#)?;
        assert_eq!(config, CgroupConfig::with_path("/some/path"));

        let config: CgroupConfig = serde_json::from_str(r#"{"parent": "p", "name": "n"}"#)?;
        assert_eq!(config, CgroupConfig::legacy("p", "n"));

        let config: CgroupConfig = serde_json::from_str("{}")?;
        assert_eq!(config.location(), Err(ConfigError::MissingPath));
        Ok(())
    }
}
