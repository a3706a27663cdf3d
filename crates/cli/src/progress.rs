//! Mining progress display
//!
//! Renders the nonce search as an indicatif spinner; one bar at a
//! time, since every operation mines sequentially.

use indicatif::{ProgressBar, ProgressStyle};
use ledger::MiningListener;
use std::sync::Mutex;
use std::time::Duration;

pub struct MiningProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl MiningProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl MiningListener for MiningProgress {
    fn started(&self, chain: &str) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("static template"),
        );
        bar.set_message(format!("mining {}", chain));
        bar.enable_steady_tick(Duration::from_millis(100));
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn improved(&self, attempts: u64, best_bits: u32, threshold: u32) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.set_message(format!(
                "mining: {}/{} bits after {} nonces",
                best_bits, threshold, attempts
            ));
        }
    }

    fn mined(&self, _chain: &str, _hash: &ledger::Blake3Hash) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}
