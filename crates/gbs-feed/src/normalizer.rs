//! Canonical player-id normalization.
//!
//! Sources disagree on id shape: the roster API reports `Steam_7656...` while
//! the ban manifest may carry either form. Everything is reduced to the bare
//! account id before comparison.

use gbs_schemas::{Identity, Platform};

/// Normalize a raw id for the given platform tag.
///
/// - empty input yields `""`; callers must treat that as "no identity"
/// - `Steam` / `EOS`: the exact, case-sensitive prefix (`Steam_` / `EOS_`) is
///   removed wherever it occurs, then whitespace is trimmed
/// - any other tag: trim only
///
/// Removal repeats until no prefix remains, so the result never contains the
/// prefix and normalizing twice equals normalizing once.
pub fn normalize_id(platform: &str, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match Platform::from_tag(platform) {
        Some(p) => strip_all(raw, p.id_prefix()).trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Build an [`Identity`] from a wire platform tag and raw id.
///
/// Returns `None` for unknown platforms and for ids that normalize to empty.
pub fn identity_from_raw(platform: &str, raw: &str) -> Option<Identity> {
    let p = Platform::from_tag(platform)?;
    Identity::try_new(p, normalize_id(platform, raw))
}

fn strip_all(raw: &str, prefix: &str) -> String {
    let mut s = raw.replace(prefix, "");
    // "SteSteam_am_1" -> "Steam_1" after one pass.
    while s.contains(prefix) {
        s = s.replace(prefix, "");
    }
    s
}
