//! The rectifier: turns diff streams into scheduler calls
//!
//! Each `rectify_*` method drains its input stream with a bounded worker
//! pool and reports every outcome on the resolution stream. A failing
//! deployment never halts the rest of the pass; retries are the update
//! loop's or the operator's job, not the rectifier's.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, instrument, warn};

use drover_core::{DeployablePair, Deployment, DeploymentId, Deployments};

use crate::client::RectificationClient;
use crate::diff::{ArtifactNamer, diff, label};
use crate::error::{ClientError, RectifyOp, SchedulerError};

/// Default fan-out per rectify method.
pub const DEFAULT_WORKERS: usize = 8;

/// Buffer size for gathered resolution streams.
const RESOLUTION_BUFFER: usize = 64;

/// The typed outcome of one rectification action.
#[derive(Debug)]
pub struct DiffResolution {
    pub id: DeploymentId,
    pub verb: ResolutionVerb,
    pub error: Option<ClientError>,
}

impl DiffResolution {
    fn ok(id: DeploymentId, verb: ResolutionVerb) -> Self {
        Self {
            id,
            verb,
            error: None,
        }
    }

    fn failed(id: DeploymentId, verb: ResolutionVerb, error: ClientError) -> Self {
        Self {
            id,
            verb,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for DiffResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "{}: {}", self.id, self.verb),
            Some(err) => write!(f, "{}: {}", self.id, err),
        }
    }
}

/// What a successful resolution did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionVerb {
    RequestCreated,
    Deployed,
    Scaled,
    Redeployed,
    DeleteSkipped,
    Unchanged,
}

impl fmt::Display for ResolutionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionVerb::RequestCreated => "request created",
            ResolutionVerb::Deployed => "deployed",
            ResolutionVerb::Scaled => "scaled",
            ResolutionVerb::Redeployed => "redeployed",
            ResolutionVerb::DeleteSkipped => "delete skipped",
            ResolutionVerb::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy)]
enum Action {
    Create,
    Modify,
    Delete,
}

/// Stable request identity for the downstream scheduler, a pure function
/// of deployment identity: the last path segment of the offset dir (or of
/// the repo when there is no dir), the cluster name, and a truncated
/// SHA-256 of `(repo, flavor)`. Identical for the prior and post sides of
/// one pair, so creates followed by modifies converge on one request.
pub fn compute_request_id(deployment: &Deployment) -> String {
    let location = &deployment.source_id.location;
    let base = if location.dir.is_empty() {
        &location.repo
    } else {
        &location.dir
    };
    let segment = base
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("root-project");

    let mut hasher = Sha256::new();
    hasher.update(location.repo.as_bytes());
    hasher.update(b"\n");
    hasher.update(deployment.flavor.as_bytes());
    let digest = hasher.finalize();

    format!(
        "{}---{}-{}",
        segment,
        deployment.cluster_name,
        hex::encode(&digest[..8])
    )
}

/// Drives a `RectificationClient` from streams of deployable pairs.
pub struct Rectifier<C> {
    client: Arc<C>,
    workers: usize,
}

impl<C: RectificationClient + 'static> Rectifier<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Process create pairs until the input closes, then drain in-flight
    /// work and return. For each pair: `create_request`, then `deploy`;
    /// both calls report on `out`.
    pub async fn rectify_creates(
        &self,
        input: mpsc::Receiver<DeployablePair>,
        out: mpsc::Sender<DiffResolution>,
    ) {
        self.run(input, out, Action::Create).await
    }

    /// Process modify pairs, issuing the minimal sub-actions that move the
    /// prior deployment to the post one.
    pub async fn rectify_modifies(
        &self,
        input: mpsc::Receiver<DeployablePair>,
        out: mpsc::Sender<DiffResolution>,
    ) {
        self.run(input, out, Action::Modify).await
    }

    /// Process delete pairs. By current policy no scheduler call is made;
    /// every pair is acknowledged with success.
    pub async fn rectify_deletes(
        &self,
        input: mpsc::Receiver<DeployablePair>,
        out: mpsc::Sender<DiffResolution>,
    ) {
        self.run(input, out, Action::Delete).await
    }

    async fn run(
        &self,
        input: mpsc::Receiver<DeployablePair>,
        out: mpsc::Sender<DiffResolution>,
        action: Action,
    ) {
        ReceiverStream::new(input)
            .for_each_concurrent(self.workers, |pair| {
                let out = out.clone();
                async move {
                    let Some(id) = pair.id() else {
                        warn!("dropping deployable pair with neither side present");
                        return;
                    };
                    let work = async {
                        match action {
                            Action::Create => self.create_pair(id.clone(), pair).await,
                            Action::Modify => self.modify_pair(id.clone(), pair).await,
                            Action::Delete => self.delete_pair(id.clone()),
                        }
                    };
                    // A panicking pair must not take the pool down with it.
                    match AssertUnwindSafe(work).catch_unwind().await {
                        Ok(resolutions) => {
                            for resolution in resolutions {
                                let _ = out.send(resolution).await;
                            }
                        }
                        Err(payload) => {
                            let message = panic_message(payload);
                            error!(%id, message, "rectification worker panicked");
                            let (verb, op) = match action {
                                Action::Create | Action::Modify => {
                                    (ResolutionVerb::RequestCreated, RectifyOp::CreateRequest)
                                }
                                Action::Delete => (ResolutionVerb::DeleteSkipped, RectifyOp::Delete),
                            };
                            let error = ClientError::new(
                                op,
                                id.clone(),
                                SchedulerError::new(format!("worker panicked: {message}")),
                            );
                            let _ = out.send(DiffResolution::failed(id, verb, error)).await;
                        }
                    }
                }
            })
            .await;
    }

    async fn create_pair(&self, id: DeploymentId, pair: DeployablePair) -> Vec<DiffResolution> {
        let executor_data = pair.executor_data;
        let Some(post) = pair.post else {
            let error = ClientError::new(
                RectifyOp::CreateRequest,
                id.clone(),
                SchedulerError::new("create pair has no post side"),
            );
            return vec![DiffResolution::failed(id, ResolutionVerb::RequestCreated, error)];
        };

        let request_id = executor_data.unwrap_or_else(|| compute_request_id(&post.deployment));
        debug!(%id, request_id, "creating deployment request");

        if let Err(cause) = self.client.create_request(&post.deployment, &request_id).await {
            let error = ClientError::new(RectifyOp::CreateRequest, id.clone(), cause);
            return vec![DiffResolution::failed(id, ResolutionVerb::RequestCreated, error)];
        }
        let mut resolutions = vec![DiffResolution::ok(id.clone(), ResolutionVerb::RequestCreated)];

        match self
            .client
            .deploy(&post.deployment, &request_id, &post.artifact)
            .await
        {
            Ok(()) => resolutions.push(DiffResolution::ok(id, ResolutionVerb::Deployed)),
            Err(cause) => {
                let error = ClientError::new(RectifyOp::Deploy, id.clone(), cause);
                resolutions.push(DiffResolution::failed(id, ResolutionVerb::Deployed, error));
            }
        }
        resolutions
    }

    async fn modify_pair(&self, id: DeploymentId, pair: DeployablePair) -> Vec<DiffResolution> {
        let executor_data = pair.executor_data;
        let (Some(prior), Some(post)) = (pair.prior, pair.post) else {
            let error = ClientError::new(
                RectifyOp::CreateRequest,
                id.clone(),
                SchedulerError::new("modify pair is missing a side"),
            );
            return vec![DiffResolution::failed(id, ResolutionVerb::RequestCreated, error)];
        };

        let request_id = executor_data.unwrap_or_else(|| compute_request_id(&post.deployment));
        let prior_config = &prior.deployment.config;
        let post_config = &post.deployment.config;

        let scale_changed = prior_config.num_instances != post_config.num_instances;
        let image_changed = prior.deployment.source_id.version != post.deployment.source_id.version
            || prior.artifact.name != post.artifact.name;
        let rest_changed = prior_config.env != post_config.env
            || prior_config.resources != post_config.resources
            || prior_config.volumes != post_config.volumes;

        if rest_changed {
            // Request spec and tasks both go stale: refresh then redeploy.
            debug!(%id, request_id, "modify: full rollout");
            if let Err(cause) = self.client.create_request(&post.deployment, &request_id).await {
                let error = ClientError::new(RectifyOp::CreateRequest, id.clone(), cause);
                return vec![DiffResolution::failed(id, ResolutionVerb::RequestCreated, error)];
            }
            let mut resolutions =
                vec![DiffResolution::ok(id.clone(), ResolutionVerb::RequestCreated)];
            match self
                .client
                .deploy(&post.deployment, &request_id, &post.artifact)
                .await
            {
                Ok(()) => resolutions.push(DiffResolution::ok(id, ResolutionVerb::Deployed)),
                Err(cause) => {
                    let error = ClientError::new(RectifyOp::Deploy, id.clone(), cause);
                    resolutions.push(DiffResolution::failed(id, ResolutionVerb::Deployed, error));
                }
            }
            resolutions
        } else if scale_changed {
            // Only the instance count moved: update the request spec.
            debug!(%id, request_id, instances = post_config.num_instances, "modify: scale only");
            match self.client.create_request(&post.deployment, &request_id).await {
                Ok(()) => vec![DiffResolution::ok(id, ResolutionVerb::Scaled)],
                Err(cause) => {
                    let error = ClientError::new(RectifyOp::CreateRequest, id.clone(), cause);
                    vec![DiffResolution::failed(id, ResolutionVerb::Scaled, error)]
                }
            }
        } else if image_changed {
            // Only the software moved: roll the tasks.
            debug!(%id, request_id, artifact = %post.artifact.name, "modify: redeploy only");
            match self
                .client
                .deploy(&post.deployment, &request_id, &post.artifact)
                .await
            {
                Ok(()) => vec![DiffResolution::ok(id, ResolutionVerb::Redeployed)],
                Err(cause) => {
                    let error = ClientError::new(RectifyOp::Deploy, id.clone(), cause);
                    vec![DiffResolution::failed(id, ResolutionVerb::Redeployed, error)]
                }
            }
        } else {
            vec![DiffResolution::ok(id, ResolutionVerb::Unchanged)]
        }
    }

    fn delete_pair(&self, id: DeploymentId) -> Vec<DiffResolution> {
        // Deletion is deliberately suppressed: acknowledge and move on.
        debug!(%id, "delete suppressed by policy");
        vec![DiffResolution::ok(id, ResolutionVerb::DeleteSkipped)]
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One whole reconciliation pass: diff the two sets, label the actionable
/// streams with artifacts, rectify all three concurrently, and gather
/// every resolution. Always terminates; partial failure shows up as error
/// resolutions, never as an early exit.
#[instrument(skip_all, fields(intended = intended.len(), observed = observed.len()))]
pub async fn resolve<C: RectificationClient + 'static>(
    intended: Deployments,
    observed: Deployments,
    rectifier: &Rectifier<C>,
    namer: ArtifactNamer,
) -> Vec<DiffResolution> {
    let streams = diff(intended, observed);
    let pairs = label(streams, namer);

    let (tx, mut rx) = mpsc::channel(RESOLUTION_BUFFER);
    let collector = tokio::spawn(async move {
        let mut all = Vec::new();
        while let Some(resolution) = rx.recv().await {
            all.push(resolution);
        }
        all
    });

    tokio::join!(
        rectifier.rectify_creates(pairs.creates, tx.clone()),
        rectifier.rectify_modifies(pairs.modifies, tx.clone()),
        rectifier.rectify_deletes(pairs.deletes, tx.clone()),
    );
    drop(tx);

    collector.await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DummyRectificationClient;
    use crate::diff::default_namer;
    use drover_core::{
        BuildArtifact, Cluster, DeployConfig, Deployable, SourceLocation, Volume, VolumeMode,
    };
    use semver::Version;

    fn deployable(artifact: &str) -> Deployable {
        Deployable {
            deployment: Deployment {
                source_id: SourceLocation::new("fake.tld/org/project", "")
                    .at_version(Version::new(0, 0, 0)),
                cluster_name: "cluster".to_string(),
                cluster: Cluster::new("cluster", "cluster"),
                config: DeployConfig {
                    num_instances: 1,
                    ..DeployConfig::default()
                },
                ..Deployment::default()
            },
            artifact: BuildArtifact::docker(artifact),
        }
    }

    fn base_pair() -> DeployablePair {
        DeployablePair::modify(deployable("the-prior-image"), deployable("the-post-image"))
    }

    async fn feed(pairs: Vec<DeployablePair>) -> mpsc::Receiver<DeployablePair> {
        let (tx, rx) = mpsc::channel(pairs.len().max(1));
        for pair in pairs {
            tx.send(pair).await.unwrap();
        }
        rx
    }

    async fn drain(mut rx: mpsc::Receiver<DiffResolution>) -> Vec<DiffResolution> {
        let mut all = Vec::new();
        while let Some(resolution) = rx.recv().await {
            all.push(resolution);
        }
        all
    }

    fn assert_all_ok(resolutions: &[DiffResolution]) {
        for resolution in resolutions {
            assert!(resolution.is_ok(), "unexpected error: {resolution}");
        }
    }

    #[tokio::test]
    async fn test_modify_scale_only_updates_request() {
        let mut pair = base_pair();
        pair.prior.as_mut().unwrap().deployment.config.num_instances = 12;
        pair.post.as_mut().unwrap().deployment.config.num_instances = 24;

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].verb, ResolutionVerb::Scaled);

        assert!(client.deployed().is_empty());
        let created = client.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].deployment.config.num_instances, 24);
    }

    #[tokio::test]
    async fn test_modify_image_only_redeploys() {
        let mut pair = base_pair();
        pair.prior.as_mut().unwrap().deployment.source_id.version =
            Version::parse("1.2.3-test").unwrap();
        {
            let post = pair.post.as_mut().unwrap();
            post.deployment.source_id.version = Version::parse("2.3.4-new").unwrap();
            post.artifact = BuildArtifact::docker("2.3.4");
        }

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);
        assert_eq!(resolutions[0].verb, ResolutionVerb::Redeployed);

        assert!(client.created().is_empty());
        let deployed = client.deployed();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].artifact.name, "2.3.4");
    }

    #[tokio::test]
    async fn test_modify_resources_forces_full_rollout() {
        let mut pair = base_pair();
        {
            let prior = pair.prior.as_mut().unwrap();
            prior.deployment.source_id.version = Version::parse("1.2.3-test").unwrap();
            prior
                .deployment
                .config
                .resources
                .insert("memory".to_string(), "100".to_string());
        }
        {
            let post = pair.post.as_mut().unwrap();
            post.deployment.source_id.version = Version::parse("1.2.3-test").unwrap();
            post.deployment
                .config
                .resources
                .insert("memory".to_string(), "500".to_string());
            post.artifact = BuildArtifact::docker("1.2.3");
        }

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);

        assert_eq!(client.created().len(), 1);
        let deployed = client.deployed();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].artifact.name, "1.2.3");
        assert_eq!(deployed[0].deployment.config.resources["memory"], "500");
    }

    #[tokio::test]
    async fn test_modify_volume_mode_forces_full_rollout() {
        let mut pair = base_pair();
        {
            let prior = pair.prior.as_mut().unwrap();
            prior.deployment.source_id.version = Version::parse("1.2.3-test").unwrap();
            prior.deployment.config.num_instances = 1;
            prior.deployment.config.volumes =
                vec![Volume::new("host", "container", VolumeMode::Ro)];
        }
        {
            let post = pair.post.as_mut().unwrap();
            post.deployment.source_id.version = Version::parse("2.3.4-new").unwrap();
            post.deployment.config.num_instances = 24;
            post.deployment.config.volumes =
                vec![Volume::new("host", "container", VolumeMode::Rw)];
            post.artifact = BuildArtifact::docker("2.3.4");
        }

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);

        let created = client.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].deployment.config.num_instances, 24);

        let deployed = client.deployed();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].artifact.name, "2.3.4");
        assert_eq!(deployed[0].deployment.config.volumes[0].mode, VolumeMode::Rw);
    }

    #[tokio::test]
    async fn test_modify_identical_pair_is_a_no_op() {
        let pair = DeployablePair::modify(deployable("same-image"), deployable("same-image"));

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].verb, ResolutionVerb::Unchanged);
        assert!(client.created().is_empty());
        assert!(client.deployed().is_empty());
    }

    #[tokio::test]
    async fn test_creates_issue_request_then_deploy() {
        let mut post = deployable("reqid,0.0.0");
        post.deployment.cluster_name = "nick".to_string();
        post.deployment.config.num_instances = 12;
        let pair = DeployablePair::create(post);

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_creates(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);
        let verbs: Vec<_> = resolutions.iter().map(|r| r.verb).collect();
        assert_eq!(verbs, [ResolutionVerb::RequestCreated, ResolutionVerb::Deployed]);

        let deployed = client.deployed();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].deployment.cluster.base_url, "cluster");
        assert_eq!(deployed[0].artifact.name, "reqid,0.0.0");

        let created = client.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].deployment.cluster.base_url, "cluster");
        assert_eq!(created[0].deployment.config.num_instances, 12);

        let suffix = created[0]
            .request_id
            .strip_prefix("project---nick-")
            .expect("request id shape");
        assert!(!suffix.is_empty());
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[tokio::test]
    async fn test_deletes_touch_nothing() {
        let mut prior = deployable("the-prior-image");
        prior.deployment.cluster_name = String::new();
        prior.deployment.config.num_instances = 12;
        let pair = DeployablePair::delete(prior);

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_deletes(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        assert_all_ok(&resolutions);
        assert_eq!(resolutions[0].verb, ResolutionVerb::DeleteSkipped);

        assert!(client.deleted().is_empty());
        assert!(client.deployed().is_empty());
        assert!(client.created().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_halt_the_pass() {
        let mut failing = deployable("bad-image");
        failing.deployment.cluster_name = "nick".to_string();
        let mut healthy = deployable("good-image");
        healthy.deployment.source_id.location.repo = "fake.tld/org/other".to_string();
        healthy.deployment.cluster_name = "nick".to_string();

        let client = Arc::new(DummyRectificationClient::new());
        client.fail_for(failing.deployment.id());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![
            DeployablePair::create(failing),
            DeployablePair::create(healthy),
        ])
        .await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_creates(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        let errors: Vec<_> = resolutions.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error.as_ref().unwrap().op, RectifyOp::CreateRequest);

        // The healthy pair still went all the way through.
        assert_eq!(client.created().len(), 1);
        assert_eq!(client.deployed().len(), 1);
        assert_eq!(client.created()[0].deployment.source_id.location.repo, "fake.tld/org/other");
    }

    #[tokio::test]
    async fn test_panicking_pair_is_contained() {
        let mut poisoned = deployable("poison-image");
        poisoned.deployment.cluster_name = "nick".to_string();
        let mut healthy = deployable("good-image");
        healthy.deployment.source_id.location.repo = "fake.tld/org/other".to_string();
        healthy.deployment.cluster_name = "nick".to_string();

        let client = Arc::new(DummyRectificationClient::new());
        client.panic_for(poisoned.deployment.id());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![
            DeployablePair::create(poisoned),
            DeployablePair::create(healthy),
        ])
        .await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_creates(input, out_tx).await;

        let resolutions = drain(out_rx).await;
        let errors: Vec<_> = resolutions.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(errors.len(), 1);
        let message = errors[0].error.as_ref().unwrap().to_string();
        assert!(message.contains("panicked"), "got: {message}");

        assert_eq!(client.deployed().len(), 1);
    }

    #[tokio::test]
    async fn test_executor_data_overrides_derived_request_id() {
        let mut pair = base_pair().with_executor_data("reqid");
        pair.prior.as_mut().unwrap().deployment.config.num_instances = 12;
        pair.post.as_mut().unwrap().deployment.config.num_instances = 24;

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());

        let input = feed(vec![pair]).await;
        let (out_tx, out_rx) = mpsc::channel(16);
        rectifier.rectify_modifies(input, out_tx).await;

        assert_all_ok(&drain(out_rx).await);
        let created = client.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].request_id, "reqid");
    }

    #[test]
    fn test_request_id_shape_and_determinism() {
        let d = deployable("any").deployment;
        let first = compute_request_id(&d);
        let second = compute_request_id(&d);
        assert_eq!(first, second);
        assert!(first.starts_with("project---cluster-"));

        let mut flavored = d.clone();
        flavored.flavor = "blue".to_string();
        assert_ne!(compute_request_id(&flavored), first);

        let mut offset = d.clone();
        offset.source_id.location.dir = "nested/svc".to_string();
        assert!(compute_request_id(&offset).starts_with("svc---cluster-"));

        // Prior and post of one pair agree: the id ignores version,
        // config, and artifact.
        let mut newer = d;
        newer.source_id.version = Version::parse("9.9.9").unwrap();
        newer.config.num_instances = 99;
        assert_eq!(compute_request_id(&newer), first);
    }

    #[tokio::test]
    async fn test_resolve_full_pass() {
        let fresh = {
            let mut d = deployable("x").deployment;
            d.source_id.location.repo = "fake.tld/org/fresh".to_string();
            d.cluster_name = "dev".to_string();
            d
        };
        let stale = {
            let mut d = deployable("x").deployment;
            d.source_id.location.repo = "fake.tld/org/stale".to_string();
            d.cluster_name = "dev".to_string();
            d
        };
        let drifted_post = {
            let mut d = deployable("x").deployment;
            d.source_id.location.repo = "fake.tld/org/drift".to_string();
            d.cluster_name = "dev".to_string();
            d.source_id.version = Version::parse("2.0.0").unwrap();
            d
        };
        let drifted_prior = {
            let mut d = drifted_post.clone();
            d.source_id.version = Version::parse("1.0.0").unwrap();
            d
        };

        let intended: Deployments = [fresh.clone(), drifted_post].into_iter().collect();
        let observed: Deployments = [stale, drifted_prior].into_iter().collect();

        let client = Arc::new(DummyRectificationClient::new());
        let rectifier = Rectifier::new(client.clone());
        let resolutions = resolve(intended, observed, &rectifier, default_namer()).await;

        assert_all_ok(&resolutions);
        assert_eq!(resolutions.len(), 4);

        // The fresh deployment was created and deployed, the drifted one
        // redeployed, the stale one left alone.
        assert_eq!(client.created().len(), 1);
        assert_eq!(client.created()[0].deployment.source_id.location.repo, "fake.tld/org/fresh");
        assert_eq!(client.deployed().len(), 2);
        assert!(client.deleted().is_empty());
    }
}
