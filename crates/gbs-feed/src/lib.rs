//! gbs-feed
//!
//! The two remote reads of a sync cycle: the live roster of connected players
//! (JSON) and the global ban manifest (XML). Both normalize player ids through
//! [`normalizer`] so the reconcile step compares like with like.
//!
//! This crate does **not** touch the local ban store.

pub mod banlist;
pub mod normalizer;
pub mod provider;
pub mod roster;

pub use banlist::{parse_ban_manifest, HttpBanSource};
pub use normalizer::{identity_from_raw, normalize_id};
pub use provider::{BanSource, FeedError, RosterSource};
pub use roster::{parse_roster, HttpRosterSource};
