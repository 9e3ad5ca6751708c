//! The update/retry loop: mutating the GDM under optimistic concurrency

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use drover_core::{
    CoreError, DeploymentId, Deployments, Manifest, SourceId, State, User, expand,
};
use drover_store::StateManager;

use crate::error::{EngineError, Result};

/// How many times a conflicting write is retried before giving up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Point `did` at `sid`'s version within `state`.
///
/// Finds or inserts the manifest named by `did`, then sets the version of
/// its deploy spec for `did`'s cluster, leaving every other field alone.
pub fn update_state(state: &mut State, sid: &SourceId, did: &DeploymentId) -> Result<()> {
    if did.cluster.is_empty() {
        return Err(EngineError::InvalidDeployId("no cluster name".to_string()));
    }
    if !state.defs.clusters.contains_key(&did.cluster) {
        return Err(CoreError::UnknownCluster(did.cluster.clone()).into());
    }

    if state.manifests.get(&did.manifest).is_none() {
        state.manifests.add(Manifest {
            source: did.manifest.source.clone(),
            flavor: did.manifest.flavor.clone(),
            ..Manifest::default()
        })?;
    }
    let Some(manifest) = state.manifests.get_mut(&did.manifest) else {
        // just inserted above
        return Err(CoreError::InvalidState(format!(
            "manifest {} vanished during update",
            did.manifest
        ))
        .into());
    };

    manifest
        .deployments
        .entry(did.cluster.clone())
        .or_default()
        .version = sid.version.clone();
    Ok(())
}

/// Read the GDM, apply [`update_state`], and write it back, re-reading
/// and retrying on `ConcurrentUpdate` up to [`MAX_UPDATE_ATTEMPTS`] times
/// with a short jittered backoff. Any other error returns immediately.
///
/// On success returns the expanded intended deployment set of the state
/// that was written.
pub async fn update<S: StateManager + ?Sized>(
    manager: &S,
    sid: &SourceId,
    did: &DeploymentId,
    user: &User,
) -> Result<Deployments> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut state = manager.read_state().await?;
        update_state(&mut state, sid, did)?;
        match manager.write_state(&state, user).await {
            Ok(()) => {
                info!(%did, version = %sid.version, attempt, "updated deployment intent");
                return Ok(expand(&state)?);
            }
            Err(err) if err.is_concurrent_update() && attempt < MAX_UPDATE_ATTEMPTS => {
                let delay = backoff(attempt);
                debug!(%did, attempt, delay_ms = delay.as_millis() as u64, "write conflicted, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..25);
    Duration::from_millis(25 * u64::from(attempt) + jitter)
}
