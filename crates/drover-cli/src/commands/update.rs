//! Update command - point one deployment at a new version

use std::path::Path;

use console::style;
use drover_core::{DeploymentId, ManifestId, SourceId, User};
use drover_engine::update;
use drover_store::DiskStateManager;

use crate::error::Result;

pub async fn run(
    state_dir: &Path,
    source_id: &str,
    cluster: &str,
    flavor: &str,
    user_name: &str,
) -> Result<()> {
    let sid = SourceId::parse(source_id)?;
    let did = DeploymentId::new(cluster, ManifestId::new(sid.location.clone(), flavor));
    let user = User::new(user_name, "");

    let manager = DiskStateManager::new(state_dir);
    let deployments = update(&manager, &sid, &did, &user).await?;

    println!(
        "{} {} now intends {} on {}",
        style("✓").green().bold(),
        style(&did.manifest).cyan(),
        style(&sid.version).yellow(),
        style(cluster).cyan()
    );
    if let Some(deployment) = deployments.get(&did) {
        println!(
            "  {} deployment{} total, {} instance{} here",
            deployments.len(),
            if deployments.len() == 1 { "" } else { "s" },
            deployment.config.num_instances,
            if deployment.config.num_instances == 1 { "" } else { "s" },
        );
    }
    Ok(())
}
