//! Manifests command - show the GDM's contents

use std::path::Path;

use console::style;
use drover_store::{DiskStateManager, StateManager};

use crate::error::Result;

pub async fn run(state_dir: &Path) -> Result<()> {
    let manager = DiskStateManager::new(state_dir);
    let state = manager.read_state().await?;

    if state.manifests.is_empty() {
        println!("No manifests defined");
        return Ok(());
    }

    for (id, manifest) in state.manifests.iter() {
        println!("{} ({})", style(id).cyan().bold(), manifest.kind);
        for (cluster, spec) in &manifest.deployments {
            println!(
                "  {} {} ({} instance{})",
                cluster,
                style(&spec.version).yellow(),
                spec.num_instances,
                if spec.num_instances == 1 { "" } else { "s" },
            );
        }
    }
    Ok(())
}
