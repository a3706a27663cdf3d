//! Open an experiment and show its state

use crate::config;
use anyhow::Result;
use archive::PathEntry;
use owo_colors::OwoColorize;

pub fn run(experiment_id: &str, peer_flags: &[String]) -> Result<()> {
    let node = config::open_node(peer_flags)?;
    let experiment = archive::open(&node, experiment_id)?;

    println!("{} {}", "experiment".yellow().bold(), experiment.id.cyan());
    match experiment.path_chain.head {
        Some(head) => println!("{} {}", "Head:  ".dimmed(), head),
        None => println!("{} {}", "Head:  ".dimmed(), "(no local data)".dimmed()),
    }

    let mut files = 0usize;
    archive::replay::<PathEntry, _>(&node, &experiment.path_chain, |_, _, entry| {
        files += 1;
        println!("  {}", entry.to_string().cyan());
        Ok(())
    })?;
    println!("{} {} files", "Total: ".dimmed(), files);
    Ok(())
}
