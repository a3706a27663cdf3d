//! Archive paths into a new experiment

use crate::config;
use crate::progress::MiningProgress;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run(paths: &[PathBuf], peer_flags: &[String]) -> Result<()> {
    let node = config::open_node(peer_flags)?;

    let listener = MiningProgress::new();
    let experiment = archive::create(&node, &listener, paths)?;

    let blocks = experiment.path_chain.length(node.cache())?;
    println!("{} {}", "Created experiment".green(), experiment.id.cyan().bold());
    println!("  path chain: {} ({} records)", experiment.path_chain.name, blocks);
    println!();
    println!("Rebuild it later with:");
    println!("  amber save {} <dir>", experiment.id);
    Ok(())
}
