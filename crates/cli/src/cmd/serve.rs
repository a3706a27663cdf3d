//! Serve chain data to peers

use crate::config;
use anyhow::Result;
use std::sync::Arc;

pub fn run(addr: Option<&str>, peer_flags: &[String]) -> Result<()> {
    let node = Arc::new(config::open_node(peer_flags)?);

    let default_addr = format!("0.0.0.0:{}", ledger::network::DEFAULT_PORT);
    let addr = addr.unwrap_or(&default_addr);

    println!("Serving amber chains on {}", addr);
    ledger::serve(node, addr, archive::accepts_chain)?;
    Ok(())
}
