//! gbs-reconcile
//!
//! Matching engine for the global ban sync:
//! - matches = roster ∩ global ban set (exact platform + id)
//! - additions = matches not already present in the local blacklist
//! - append-only: existing entries are never edited or removed
//!
//! Deterministic, pure logic. No IO. No HTTP, no file access.

mod engine;
mod types;

pub use engine::{find_matches, plan_additions};
pub use types::*;
