//! gbs-daemon
//!
//! One sync cycle ([`cycle::ReconcileCycle::run_once`]) and the fixed-interval
//! driver around it ([`scheduler::run_loop`]). The binary in `main.rs` only
//! loads config, sets up tracing and hands over to the driver.

pub mod cycle;
pub mod scheduler;
