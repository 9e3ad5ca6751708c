//! The whole Global Deployment Manifest: cluster definitions plus manifests

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::manifest::Manifests;

/// A target cluster as declared in `defs.yaml`. The `env` and `resources`
/// maps are the cluster-level base layer applied during expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, String>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            ..Cluster::default()
        }
    }
}

/// Shared definitions: the cluster inventory plus global env/resource
/// defaults, the lowest layer of the expansion merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defs {
    #[serde(default)]
    pub clusters: IndexMap<String, Cluster>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env_vars: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, String>,
}

impl Defs {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// The whole GDM. Loaded and persisted by a StateManager; mutated only by
/// the update loop, one fresh copy per attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub defs: Defs,
    pub manifests: Manifests,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the cross-cutting invariant: every deployment key in every
    /// manifest names a declared cluster.
    pub fn validate(&self) -> Result<()> {
        for (id, manifest) in self.manifests.iter() {
            manifest.validate()?;
            for cluster in manifest.deployments.keys() {
                if !self.defs.clusters.contains_key(cluster) {
                    return Err(CoreError::InvalidState(format!(
                        "manifest {id} deploys to undeclared cluster {cluster:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The operator on whose behalf a state mutation is written; recorded for
/// audit by the state manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeploySpec;
    use crate::manifest::Manifest;
    use crate::source::SourceLocation;

    #[test]
    fn test_defs_yaml_round_trip() {
        let mut defs = Defs::default();
        defs.clusters
            .insert("dev".to_string(), Cluster::new("dev", "http://dev.example.com"));
        defs.env_vars
            .insert("REGION".to_string(), "eu-west-1".to_string());
        let yaml = defs.to_yaml().unwrap();
        let back = Defs::from_yaml(&yaml).unwrap();
        assert_eq!(back, defs);
    }

    #[test]
    fn test_validate_catches_undeclared_cluster() {
        let mut state = State::new();
        let mut manifest = Manifest {
            source: SourceLocation::new("github.com/example/app", ""),
            ..Manifest::default()
        };
        manifest
            .deployments
            .insert("prod".to_string(), DeploySpec::default());
        state.manifests.add(manifest).unwrap();

        assert!(matches!(state.validate(), Err(CoreError::InvalidState(_))));

        state
            .defs
            .clusters
            .insert("prod".to_string(), Cluster::new("prod", ""));
        state.validate().unwrap();
    }

    #[test]
    fn test_user_display() {
        let user = User::new("Jo Operator", "jo@example.com");
        insta::assert_snapshot!(user.to_string(), @"Jo Operator <jo@example.com>");
    }
}
