//! Streaming set difference between intended and observed deployments
//!
//! Direction: the "from" set is the **intended** state. A deployment id
//! present only in `intended` is `created` (the cluster must start running
//! it); present only in `observed` it is `deleted` (the cluster runs
//! something no manifest asks for). Ids present in both are `retained`
//! when the two sides match and `modified` otherwise, with
//! `prior = observed` and `post = intended`.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::debug;

use drover_core::{
    BuildArtifact, Deployable, DeployablePair, Deployment, DeploymentId, DeploymentPair,
    Deployments,
};

/// Buffer size for the labelled pair streams feeding the rectifier.
const PAIR_BUFFER: usize = 64;

/// The four lazy diff streams. Every id in the union of the input sets
/// appears on exactly one of them; all four close once the diff has
/// emitted every classification.
pub struct DiffStreams {
    pub created: mpsc::Receiver<Deployment>,
    pub deleted: mpsc::Receiver<Deployment>,
    pub retained: mpsc::Receiver<Deployment>,
    pub modified: mpsc::Receiver<DeploymentPair>,
}

/// A materialised diff, for tests and display.
#[derive(Debug, Default)]
pub struct DiffSet {
    pub created: Vec<Deployment>,
    pub deleted: Vec<Deployment>,
    pub retained: Vec<Deployment>,
    pub modified: Vec<DeploymentPair>,
}

impl DiffStreams {
    /// Drain all four streams. The streams are buffered to the full union
    /// size, so sequential draining cannot deadlock the producer.
    pub async fn collect(mut self) -> DiffSet {
        let mut set = DiffSet::default();
        while let Some(d) = self.created.recv().await {
            set.created.push(d);
        }
        while let Some(d) = self.deleted.recv().await {
            set.deleted.push(d);
        }
        while let Some(d) = self.retained.recv().await {
            set.retained.push(d);
        }
        while let Some(p) = self.modified.recv().await {
            set.modified.push(p);
        }
        set
    }
}

/// Stream the difference between the intended and observed deployment
/// sets. Performs no I/O and cannot fail; must be called from within a
/// tokio runtime. Streams are buffered to the union size so the producer
/// never blocks on a slow consumer.
pub fn diff(intended: Deployments, observed: Deployments) -> DiffStreams {
    let capacity = (intended.len() + observed.len()).max(1);
    let (created_tx, created) = mpsc::channel(capacity);
    let (deleted_tx, deleted) = mpsc::channel(capacity);
    let (retained_tx, retained) = mpsc::channel(capacity);
    let (modified_tx, modified) = mpsc::channel(capacity);

    tokio::spawn(async move {
        let mut from: IndexMap<DeploymentId, Deployment> =
            intended.into_iter().map(|d| (d.id(), d)).collect();

        for observed_dep in observed {
            let id = observed_dep.id();
            match from.shift_remove(&id) {
                Some(intended_dep) => {
                    if intended_dep.matches(&observed_dep) {
                        let _ = retained_tx.send(intended_dep).await;
                    } else {
                        let _ = modified_tx
                            .send(DeploymentPair {
                                id,
                                prior: observed_dep,
                                post: intended_dep,
                            })
                            .await;
                    }
                }
                None => {
                    let _ = deleted_tx.send(observed_dep).await;
                }
            }
        }

        // Whatever the walk did not claim exists only in the intent.
        for (_, intended_dep) in from {
            let _ = created_tx.send(intended_dep).await;
        }
        debug!("diff streams complete");
    });

    DiffStreams {
        created,
        deleted,
        retained,
        modified,
    }
}

/// Attaches a build artifact to a deployment. The concrete build-pack or
/// registry lookup lives behind this closure.
pub type ArtifactNamer = Arc<dyn Fn(&Deployment) -> BuildArtifact + Send + Sync>;

/// Derive a docker image name from the source identity.
pub fn default_namer() -> ArtifactNamer {
    Arc::new(|d: &Deployment| {
        BuildArtifact::docker(format!("{}:{}", d.source_id.location.repo, d.source_id.tag_name()))
    })
}

/// The three actionable streams, labelled with artifacts, ready for the
/// rectifier. Retained deployments need no action and are dropped.
pub struct PairStreams {
    pub creates: mpsc::Receiver<DeployablePair>,
    pub deletes: mpsc::Receiver<DeployablePair>,
    pub modifies: mpsc::Receiver<DeployablePair>,
}

/// Convert diff streams into `DeployablePair` streams by attaching build
/// artifacts through `namer`.
pub fn label(streams: DiffStreams, namer: ArtifactNamer) -> PairStreams {
    let DiffStreams {
        mut created,
        mut deleted,
        retained,
        mut modified,
    } = streams;
    drop(retained);

    let (create_tx, creates) = mpsc::channel(PAIR_BUFFER);
    let (delete_tx, deletes) = mpsc::channel(PAIR_BUFFER);
    let (modify_tx, modifies) = mpsc::channel(PAIR_BUFFER);

    let name = namer.clone();
    tokio::spawn(async move {
        while let Some(d) = created.recv().await {
            let artifact = name(&d);
            let pair = DeployablePair::create(Deployable {
                deployment: d,
                artifact,
            });
            if create_tx.send(pair).await.is_err() {
                break;
            }
        }
    });

    let name = namer.clone();
    tokio::spawn(async move {
        while let Some(d) = deleted.recv().await {
            let artifact = name(&d);
            let pair = DeployablePair::delete(Deployable {
                deployment: d,
                artifact,
            });
            if delete_tx.send(pair).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(p) = modified.recv().await {
            let prior_artifact = namer(&p.prior);
            let post_artifact = namer(&p.post);
            let pair = DeployablePair::modify(
                Deployable {
                    deployment: p.prior,
                    artifact: prior_artifact,
                },
                Deployable {
                    deployment: p.post,
                    artifact: post_artifact,
                },
            );
            if modify_tx.send(pair).await.is_err() {
                break;
            }
        }
    });

    PairStreams {
        creates,
        deletes,
        modifies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{Cluster, DeployConfig, SourceLocation};
    use semver::Version;
    use std::collections::HashSet;

    fn deployment(repo: &str, cluster: &str, version: &str, instances: u32) -> Deployment {
        Deployment {
            source_id: SourceLocation::new(repo, "").at_version(Version::parse(version).unwrap()),
            cluster_name: cluster.to_string(),
            cluster: Cluster::new(cluster, format!("http://{cluster}")),
            config: DeployConfig {
                num_instances: instances,
                ..DeployConfig::default()
            },
            ..Deployment::default()
        }
    }

    #[tokio::test]
    async fn test_classification() {
        let only_intended = deployment("r.tld/created", "dev", "1.0.0", 1);
        let unchanged = deployment("r.tld/kept", "dev", "1.0.0", 1);
        let changed_post = deployment("r.tld/changed", "dev", "2.0.0", 1);
        let changed_prior = deployment("r.tld/changed", "dev", "1.0.0", 1);
        let only_observed = deployment("r.tld/gone", "dev", "1.0.0", 1);

        let intended: Deployments = [
            only_intended.clone(),
            unchanged.clone(),
            changed_post.clone(),
        ]
        .into_iter()
        .collect();
        let observed: Deployments = [
            unchanged.clone(),
            changed_prior.clone(),
            only_observed.clone(),
        ]
        .into_iter()
        .collect();

        let set = diff(intended, observed).collect().await;

        assert_eq!(set.created, vec![only_intended]);
        assert_eq!(set.deleted, vec![only_observed]);
        assert_eq!(set.retained, vec![unchanged]);
        assert_eq!(set.modified.len(), 1);
        // prior is the observed side, post the intended side
        assert_eq!(set.modified[0].prior, changed_prior);
        assert_eq!(set.modified[0].post, changed_post);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let set = diff(Deployments::new(), Deployments::new()).collect().await;
        assert!(set.created.is_empty());
        assert!(set.deleted.is_empty());
        assert!(set.retained.is_empty());
        assert!(set.modified.is_empty());
    }

    #[tokio::test]
    async fn test_one_sided_inputs() {
        let d = deployment("r.tld/app", "dev", "1.0.0", 1);

        let set = diff([d.clone()].into_iter().collect(), Deployments::new())
            .collect()
            .await;
        assert_eq!(set.created.len(), 1);
        assert!(set.deleted.is_empty());

        let set = diff(Deployments::new(), [d].into_iter().collect())
            .collect()
            .await;
        assert!(set.created.is_empty());
        assert_eq!(set.deleted.len(), 1);
    }

    #[tokio::test]
    async fn test_equal_up_to_ownership_is_retained() {
        let intended_dep = deployment("r.tld/app", "dev", "1.0.0", 2);
        let mut observed_dep = intended_dep.clone();
        observed_dep.owners.insert("crew@example.com".to_string());
        observed_dep.cluster.base_url = "http://other".to_string();

        let set = diff(
            [intended_dep].into_iter().collect(),
            [observed_dep].into_iter().collect(),
        )
        .collect()
        .await;
        assert_eq!(set.retained.len(), 1);
        assert!(set.modified.is_empty());
    }

    /// Every id in the union lands in exactly one stream, across a grid of
    /// overlapping set shapes.
    #[tokio::test]
    async fn test_partition_property() {
        for intended_count in 0..4usize {
            for shared in 0..3usize {
                for drifted in 0..3usize {
                    let mut intended = Deployments::new();
                    let mut observed = Deployments::new();
                    let mut union = HashSet::new();

                    for i in 0..intended_count {
                        let d = deployment(&format!("r.tld/int-{i}"), "dev", "1.0.0", 1);
                        union.insert(d.id());
                        intended.add(d);
                    }
                    for i in 0..shared {
                        let d = deployment(&format!("r.tld/shared-{i}"), "dev", "1.0.0", 1);
                        union.insert(d.id());
                        intended.add(d.clone());
                        observed.add(d);
                    }
                    for i in 0..drifted {
                        let post = deployment(&format!("r.tld/drift-{i}"), "dev", "2.0.0", 1);
                        let prior = deployment(&format!("r.tld/drift-{i}"), "dev", "1.0.0", 1);
                        union.insert(post.id());
                        intended.add(post);
                        observed.add(prior);
                    }
                    for i in 0..2usize {
                        let d = deployment(&format!("r.tld/obs-{i}"), "dev", "1.0.0", 1);
                        union.insert(d.id());
                        observed.add(d);
                    }

                    let set = diff(intended, observed).collect().await;

                    let mut seen = HashSet::new();
                    for d in set.created.iter().chain(&set.deleted).chain(&set.retained) {
                        assert!(seen.insert(d.id()), "{} classified twice", d.id());
                    }
                    for p in &set.modified {
                        assert!(seen.insert(p.id.clone()), "{} classified twice", p.id);
                    }
                    assert_eq!(seen, union);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_label_attaches_artifacts() {
        let created = deployment("r.tld/app", "dev", "1.2.0", 1);
        let gone = deployment("r.tld/old", "dev", "0.9.0", 1);

        let streams = diff(
            [created].into_iter().collect(),
            [gone].into_iter().collect(),
        );
        let mut pairs = label(streams, default_namer());

        let create = pairs.creates.recv().await.unwrap();
        assert!(create.prior.is_none());
        let post = create.post.unwrap();
        assert_eq!(post.artifact.name, "r.tld/app:1.2.0");

        let delete = pairs.deletes.recv().await.unwrap();
        assert!(delete.post.is_none());
        assert_eq!(delete.prior.unwrap().deployment.source_id.version.to_string(), "0.9.0");

        assert!(pairs.creates.recv().await.is_none());
        assert!(pairs.modifies.recv().await.is_none());
    }
}
