//! Drop local cache data for an experiment (reserved)

use crate::config;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(experiment_id: &str, peer_flags: &[String]) -> Result<()> {
    let node = config::open_node(peer_flags)?;
    archive::clean(&node, experiment_id)?;
    println!(
        "{} clean is reserved; no cache data was removed for {}",
        "Note:".yellow(),
        experiment_id
    );
    Ok(())
}
