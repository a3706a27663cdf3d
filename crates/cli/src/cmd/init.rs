//! Generate the local signing identity

use crate::config;
use anyhow::Result;
use ledger::Node;
use owo_colors::OwoColorize;

pub fn run(alias: Option<String>) -> Result<()> {
    let root = config::root_dir()?;
    let cfg = config::Config::load(&root)?;

    let alias = alias
        .or(cfg.alias)
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "amber".to_string());

    let identity = Node::init(&root, &alias)?;

    println!("{} {}", "Initialized".green(), root.display());
    println!("  alias:       {}", identity.alias().cyan());
    println!("  fingerprint: {}", identity.fingerprint());
    println!();
    println!("Next steps:");
    println!("  - amber create <path>         archive files into a new experiment");
    println!("  - amber save <id> <dir>       rebuild an experiment's files");
    println!("  - amber serve                 replicate chains to peers");
    Ok(())
}
