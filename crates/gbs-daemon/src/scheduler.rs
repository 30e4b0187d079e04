//! Fixed-interval driver: one cycle, then sleep, forever.
//!
//! A panic inside a cycle is caught and logged; the loop still sleeps and
//! tries again. There is no overall cycle timeout, only the per-request
//! timeouts of the sources.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{error, info};

use crate::cycle::{CycleOutcome, ReconcileCycle};

/// Run cycles separated by `interval`.
///
/// With `max_cycles = None` this never returns. With `Some(n)` it returns
/// after the n-th cycle without a trailing sleep, reporting how many cycles
/// ran.
pub async fn run_loop(cycle: &ReconcileCycle, interval: Duration, max_cycles: Option<u64>) -> u64 {
    let mut completed: u64 = 0;
    loop {
        match AssertUnwindSafe(cycle.run_once()).catch_unwind().await {
            Ok(outcome) => log_outcome(&outcome),
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "cycle aborted by panic; retrying after interval");
            }
        }
        completed += 1;

        if max_cycles.is_some_and(|m| completed >= m) {
            return completed;
        }

        info!(secs = interval.as_secs(), "waiting before next check");
        tokio::time::sleep(interval).await;
    }
}

fn log_outcome(o: &CycleOutcome) {
    let elapsed_ms = (chrono::Utc::now() - o.started_at).num_milliseconds();
    info!(
        roster = o.roster_size,
        bans = o.ban_source_size,
        matches = o.matches.len(),
        store = ?o.store,
        elapsed_ms,
        "cycle complete"
    );
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
