//! Reconstruct an experiment's files

use crate::config;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(experiment_id: &str, dest: &Path, peer_flags: &[String]) -> Result<()> {
    let node = config::open_node(peer_flags)?;
    let experiment = archive::open(&node, experiment_id)?;

    let restored = archive::save(&node, &experiment, dest)?;
    println!(
        "{} {} files under {}",
        "Restored".green(),
        restored,
        dest.display()
    );
    Ok(())
}
