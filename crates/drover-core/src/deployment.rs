//! Flattened deployments: the unit the diff engine and rectifier work on

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

use crate::deploy::DeployConfig;
use crate::manifest::ManifestKind;
use crate::source::{ManifestId, SourceId};
use crate::state::Cluster;

/// The total key by which deployments are diffed: one logical piece of
/// software on one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DeploymentId {
    pub cluster: String,
    pub manifest: ManifestId,
}

impl DeploymentId {
    pub fn new(cluster: impl Into<String>, manifest: ManifestId) -> Self {
        Self {
            cluster: cluster.into(),
            manifest,
        }
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.manifest, self.cluster)
    }
}

/// A completely configured deployment of one piece of software on one
/// cluster: the product of a `Manifest` with one of its `DeploySpec`s.
///
/// `cluster` is a value copy of the cluster definition, carried so a
/// scheduler adapter knows where to send requests; it takes no part in
/// deployment equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deployment {
    pub source_id: SourceId,
    pub flavor: String,
    pub cluster_name: String,
    pub cluster: Cluster,
    pub config: DeployConfig,
    pub owners: BTreeSet<String>,
    pub kind: ManifestKind,
}

impl Deployment {
    pub fn manifest_id(&self) -> ManifestId {
        ManifestId {
            source: self.source_id.location.clone(),
            flavor: self.flavor.clone(),
        }
    }

    pub fn id(&self) -> DeploymentId {
        DeploymentId {
            cluster: self.cluster_name.clone(),
            manifest: self.manifest_id(),
        }
    }

    /// Diff equality: same key, same configuration, same version. Owners,
    /// kind, and the carried cluster definition are not compared.
    pub fn matches(&self, other: &Deployment) -> bool {
        self.id() == other.id()
            && self.source_id.version == other.source_id.version
            && self.config == other.config
    }
}

/// The concrete image to run for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArtifact {
    pub name: String,
    pub kind: ArtifactKind,
}

impl BuildArtifact {
    pub fn docker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArtifactKind::Docker,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactKind {
    #[default]
    Docker,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Docker => write!(f, "docker"),
        }
    }
}

/// A deployment paired with the artifact that realizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployable {
    pub deployment: Deployment,
    pub artifact: BuildArtifact,
}

/// Payload of the diff engine's modified stream: the observed (`prior`)
/// and intended (`post`) sides of one changed deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPair {
    pub id: DeploymentId,
    pub prior: Deployment,
    pub post: Deployment,
}

/// What the rectifier consumes. Creates have no `prior`, deletes no
/// `post`, modifies both. `executor_data` carries a request id the
/// scheduler already knows for this deployment, when one exists; absent,
/// the rectifier derives one.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployablePair {
    pub prior: Option<Deployable>,
    pub post: Option<Deployable>,
    pub executor_data: Option<String>,
}

impl DeployablePair {
    pub fn create(post: Deployable) -> Self {
        Self {
            prior: None,
            post: Some(post),
            executor_data: None,
        }
    }

    pub fn delete(prior: Deployable) -> Self {
        Self {
            prior: Some(prior),
            post: None,
            executor_data: None,
        }
    }

    pub fn modify(prior: Deployable, post: Deployable) -> Self {
        Self {
            prior: Some(prior),
            post: Some(post),
            executor_data: None,
        }
    }

    pub fn with_executor_data(mut self, request_id: impl Into<String>) -> Self {
        self.executor_data = Some(request_id.into());
        self
    }

    /// The pair's diff key, taken from whichever side is present.
    pub fn id(&self) -> Option<DeploymentId> {
        self.post
            .as_ref()
            .or(self.prior.as_ref())
            .map(|d| d.deployment.id())
    }
}

/// Insertion-ordered collection of deployments, keyed by `DeploymentId`.
/// Re-adding a key replaces the entry: projections are rebuilt wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deployments {
    inner: IndexMap<DeploymentId, Deployment>,
}

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, deployment: Deployment) {
        self.inner.insert(deployment.id(), deployment);
    }

    pub fn get(&self, id: &DeploymentId) -> Option<&Deployment> {
        self.inner.get(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.inner.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DeploymentId> {
        self.inner.keys()
    }
}

impl IntoIterator for Deployments {
    type Item = Deployment;
    type IntoIter = indexmap::map::IntoValues<DeploymentId, Deployment>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_values()
    }
}

impl FromIterator<Deployment> for Deployments {
    fn from_iter<I: IntoIterator<Item = Deployment>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(|d| (d.id(), d)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::{Volume, VolumeMode};
    use crate::source::SourceLocation;
    use semver::Version;

    fn deployment(repo: &str, cluster: &str, version: &str) -> Deployment {
        Deployment {
            source_id: SourceLocation::new(repo, "").at_version(Version::parse(version).unwrap()),
            cluster_name: cluster.to_string(),
            cluster: Cluster::new(cluster, format!("http://{cluster}.example.com")),
            config: DeployConfig {
                num_instances: 2,
                ..DeployConfig::default()
            },
            ..Deployment::default()
        }
    }

    #[test]
    fn test_id_display() {
        let d = deployment("github.com/example/app", "dev", "1.0.0");
        insta::assert_snapshot!(d.id().to_string(), @"github.com/example/app@dev");
    }

    #[test]
    fn test_matches_ignores_owners_and_cluster_def() {
        let a = deployment("github.com/example/app", "dev", "1.0.0");
        let mut b = a.clone();
        b.owners.insert("someone@example.com".to_string());
        b.cluster.base_url = "http://elsewhere.example.com".to_string();
        b.kind = ManifestKind::Worker;
        assert!(a.matches(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_matches_compares_version_and_config() {
        let a = deployment("github.com/example/app", "dev", "1.0.0");

        let mut newer = a.clone();
        newer.source_id.version = Version::parse("1.0.1").unwrap();
        assert!(!a.matches(&newer));

        let mut scaled = a.clone();
        scaled.config.num_instances = 3;
        assert!(!a.matches(&scaled));

        let mut remounted = a.clone();
        remounted
            .config
            .volumes
            .push(Volume::new("/var/data", "/data", VolumeMode::Rw));
        assert!(!a.matches(&remounted));
    }

    #[test]
    fn test_deployments_insertion_order() {
        let mut deployments = Deployments::new();
        for cluster in ["dev", "staging", "prod"] {
            deployments.add(deployment("github.com/example/app", cluster, "1.0.0"));
        }
        let order: Vec<_> = deployments.iter().map(|d| d.cluster_name.clone()).collect();
        assert_eq!(order, ["dev", "staging", "prod"]);
    }

    #[test]
    fn test_add_replaces_same_id() {
        let mut deployments = Deployments::new();
        deployments.add(deployment("github.com/example/app", "dev", "1.0.0"));
        deployments.add(deployment("github.com/example/app", "dev", "2.0.0"));
        assert_eq!(deployments.len(), 1);
        let d = deployments.iter().next().unwrap();
        assert_eq!(d.source_id.version.to_string(), "2.0.0");
    }
}
