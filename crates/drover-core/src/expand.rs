//! GDM expansion: flatten a `State` into the intended deployment set

use crate::deploy::{DeployConfig, DeploySpec};
use crate::deployment::{Deployment, Deployments};
use crate::error::{CoreError, Result};
use crate::manifest::SpecDefaults;
use crate::state::{Cluster, Defs, State};

/// Flatten every manifest/cluster combination in `state` into a
/// `Deployment`, merging configuration layers along the way.
///
/// Fails with `UnknownCluster` when a manifest deploys to a cluster that
/// `defs.yaml` does not declare.
pub fn expand(state: &State) -> Result<Deployments> {
    let mut intended = Deployments::new();
    for (_, manifest) in state.manifests.iter() {
        for (cluster_name, spec) in &manifest.deployments {
            let cluster = state
                .defs
                .clusters
                .get(cluster_name)
                .ok_or_else(|| CoreError::UnknownCluster(cluster_name.clone()))?;
            intended.add(Deployment {
                source_id: manifest.source.at_version(spec.version.clone()),
                flavor: manifest.flavor.clone(),
                cluster_name: cluster_name.clone(),
                cluster: cluster.clone(),
                config: layered(&state.defs, cluster, &manifest.defaults, spec),
                owners: manifest.owners.clone(),
                kind: manifest.kind,
            });
        }
    }
    Ok(intended)
}

/// Last-writer-wins merge of the env and resource maps, lowest layer
/// first: global defs, cluster, manifest defaults, spec. Instance count
/// and volumes come from the spec alone.
fn layered(defs: &Defs, cluster: &Cluster, defaults: &SpecDefaults, spec: &DeploySpec) -> DeployConfig {
    let mut env = defs.env_vars.clone();
    env.extend(cluster.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.extend(defaults.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut resources = defs.resources.clone();
    resources.extend(cluster.resources.iter().map(|(k, v)| (k.clone(), v.clone())));
    resources.extend(defaults.resources.iter().map(|(k, v)| (k.clone(), v.clone())));
    resources.extend(spec.resources.iter().map(|(k, v)| (k.clone(), v.clone())));

    DeployConfig {
        num_instances: spec.num_instances,
        resources,
        env,
        volumes: spec.volumes.clone(),
    }
}
