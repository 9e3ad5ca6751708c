//! The RectificationClient contract and its in-memory test double

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use drover_core::{BuildArtifact, Cluster, Deployment, DeploymentId, Deployments};

use crate::error::SchedulerError;

/// Boundary to the downstream cluster scheduler.
///
/// Implementations must be safe for concurrent use; the rectifier calls
/// in from a worker pool. Within one request id the rectifier serialises
/// its calls, so adapters need no cross-call ordering of their own.
#[async_trait]
pub trait RectificationClient: Send + Sync {
    /// Create or idempotently update the long-lived request object for a
    /// deployment. Re-submitting an identical spec succeeds.
    async fn create_request(
        &self,
        deployment: &Deployment,
        request_id: &str,
    ) -> Result<(), SchedulerError>;

    /// Launch a new task revision for an existing request.
    async fn deploy(
        &self,
        deployment: &Deployment,
        request_id: &str,
        artifact: &BuildArtifact,
    ) -> Result<(), SchedulerError>;

    /// Remove a request. Currently unused by the rectifier (deletes are
    /// suppressed) but kept in the contract.
    async fn delete(&self, request_id: &str) -> Result<(), SchedulerError>;

    /// The observed side of the diff: everything the given clusters are
    /// currently running.
    async fn running_deployments(&self, clusters: &[Cluster]) -> Result<Deployments, SchedulerError>;
}

/// A recorded `create_request` call.
#[derive(Debug, Clone)]
pub struct CreatedRequest {
    pub deployment: Deployment,
    pub request_id: String,
}

/// A recorded `deploy` call.
#[derive(Debug, Clone)]
pub struct DeployedTask {
    pub deployment: Deployment,
    pub request_id: String,
    pub artifact: BuildArtifact,
}

/// In-memory client recording every call, with error- and panic-injection
/// knobs for exercising the rectifier's failure paths.
#[derive(Default)]
pub struct DummyRectificationClient {
    created: Mutex<Vec<CreatedRequest>>,
    deployed: Mutex<Vec<DeployedTask>>,
    deleted: Mutex<Vec<String>>,
    running: Mutex<Deployments>,
    fail_ids: Mutex<HashSet<DeploymentId>>,
    panic_ids: Mutex<HashSet<DeploymentId>>,
}

impl DummyRectificationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<CreatedRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn deployed(&self) -> Vec<DeployedTask> {
        self.deployed.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Every call touching this deployment fails.
    pub fn fail_for(&self, id: DeploymentId) {
        self.fail_ids.lock().unwrap().insert(id);
    }

    /// Every call touching this deployment panics, for exercising the
    /// worker pool's panic containment.
    pub fn panic_for(&self, id: DeploymentId) {
        self.panic_ids.lock().unwrap().insert(id);
    }

    /// Seed what `running_deployments` reports.
    pub fn set_running(&self, deployments: Deployments) {
        *self.running.lock().unwrap() = deployments;
    }

    fn check(&self, deployment: &Deployment) -> Result<(), SchedulerError> {
        let id = deployment.id();
        if self.panic_ids.lock().unwrap().contains(&id) {
            panic!("injected panic for {id}");
        }
        if self.fail_ids.lock().unwrap().contains(&id) {
            return Err(SchedulerError::new(format!("injected failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RectificationClient for DummyRectificationClient {
    async fn create_request(
        &self,
        deployment: &Deployment,
        request_id: &str,
    ) -> Result<(), SchedulerError> {
        self.check(deployment)?;
        self.created.lock().unwrap().push(CreatedRequest {
            deployment: deployment.clone(),
            request_id: request_id.to_string(),
        });
        Ok(())
    }

    async fn deploy(
        &self,
        deployment: &Deployment,
        request_id: &str,
        artifact: &BuildArtifact,
    ) -> Result<(), SchedulerError> {
        self.check(deployment)?;
        self.deployed.lock().unwrap().push(DeployedTask {
            deployment: deployment.clone(),
            request_id: request_id.to_string(),
            artifact: artifact.clone(),
        });
        Ok(())
    }

    async fn delete(&self, request_id: &str) -> Result<(), SchedulerError> {
        self.deleted.lock().unwrap().push(request_id.to_string());
        Ok(())
    }

    async fn running_deployments(
        &self,
        _clusters: &[Cluster],
    ) -> Result<Deployments, SchedulerError> {
        Ok(self.running.lock().unwrap().clone())
    }
}
