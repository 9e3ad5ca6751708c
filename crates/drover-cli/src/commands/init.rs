//! Init command - seed an empty state store

use std::path::Path;

use console::style;
use drover_store::DiskStateManager;

use crate::error::Result;

pub fn run(state_dir: &Path) -> Result<()> {
    let manager = DiskStateManager::init(state_dir)?;
    println!(
        "{} Initialized empty state store at {}",
        style("✓").green().bold(),
        style(manager.root().display()).cyan()
    );
    println!("  Declare clusters in {}", manager.root().join("state/defs.yaml").display());
    Ok(())
}
