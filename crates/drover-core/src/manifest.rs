//! The declarative manifest: one record per piece of software

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::deploy::DeploySpec;
use crate::error::{CoreError, Result};
use crate::source::{ManifestId, SourceLocation};

/// Declarative description of one piece of software: where its source
/// lives, who owns it, what kind of workload it is, and which version is
/// intended for each cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: SourceLocation,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub owners: BTreeSet<String>,

    #[serde(default)]
    pub kind: ManifestKind,

    /// Manifest-level env/resource overrides layered between the cluster
    /// definitions and each per-cluster spec.
    #[serde(default, skip_serializing_if = "SpecDefaults::is_empty")]
    pub defaults: SpecDefaults,

    /// Keyed by cluster name; every key must be declared in `Defs`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub deployments: IndexMap<String, DeploySpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    #[default]
    HttpService,
    Worker,
    OnDemand,
    Scheduled,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManifestKind::HttpService => "http-service",
            ManifestKind::Worker => "worker",
            ManifestKind::OnDemand => "on-demand",
            ManifestKind::Scheduled => "scheduled",
        };
        write!(f, "{s}")
    }
}

/// Manifest-level default env vars and resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDefaults {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, String>,
}

impl SpecDefaults {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.resources.is_empty()
    }
}

impl Manifest {
    pub fn id(&self) -> ManifestId {
        ManifestId {
            source: self.source.clone(),
            flavor: self.flavor.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.repo.is_empty() {
            return Err(CoreError::InvalidManifest(
                "source repository is empty".to_string(),
            ));
        }
        for cluster in self.deployments.keys() {
            if cluster.is_empty() {
                return Err(CoreError::InvalidManifest(format!(
                    "manifest {} has a deployment with an empty cluster name",
                    self.id()
                )));
            }
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Insertion-ordered collection of manifests, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifests {
    inner: IndexMap<ManifestId, Manifest>,
}

impl Manifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a manifest; fails when one with the same id is present.
    pub fn add(&mut self, manifest: Manifest) -> Result<()> {
        let id = manifest.id();
        if self.inner.contains_key(&id) {
            return Err(CoreError::DuplicateManifest(id));
        }
        self.inner.insert(id, manifest);
        Ok(())
    }

    pub fn get(&self, id: &ManifestId) -> Option<&Manifest> {
        self.inner.get(id)
    }

    pub fn get_mut(&mut self, id: &ManifestId) -> Option<&mut Manifest> {
        self.inner.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ManifestId, &Manifest)> {
        self.inner.iter()
    }
}

impl FromIterator<Manifest> for Manifests {
    fn from_iter<I: IntoIterator<Item = Manifest>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(|m| (m.id(), m)).collect(),
        }
    }
}
