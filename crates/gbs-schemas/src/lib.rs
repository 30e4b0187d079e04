//! Shared types passed between the feed sources, the reconcile engine and the
//! persisted ban store.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `name` attribute written on every entry this system appends.
pub const GLOBAL_BAN_NAME: &str = "GlobalBan";

/// `reason` attribute written on every entry this system appends.
pub const GLOBAL_BAN_REASON: &str = "Global banlist match";

/// Account ecosystem. Wire tags are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    Steam,
    #[serde(rename = "EOS")]
    Eos,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Steam => "Steam",
            Platform::Eos => "EOS",
        }
    }

    /// Exact-match parse of a wire tag. `"steam"` is not `Steam`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Steam" => Some(Platform::Steam),
            "EOS" => Some(Platform::Eos),
            _ => None,
        }
    }

    /// Prefix some sources put in front of the account id (`Steam_7656...`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::Steam => "Steam_",
            Platform::Eos => "EOS_",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player account: platform plus normalized id.
///
/// The id is never empty, never carries the platform prefix and has no
/// surrounding whitespace. [`Identity::try_new`] checks this; the feed
/// normalizer builds every identity that comes from the wire through it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub platform: Platform,
    pub id: String,
}

impl Identity {
    /// Checked constructor for an already-normalized id. `None` when the id is
    /// empty, still contains the platform prefix, or is not trimmed.
    pub fn try_new(platform: Platform, id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(platform.id_prefix()) || id.trim() != id {
            return None;
        }
        Some(Self { platform, id })
    }

    /// Unchecked constructor for ids known to be normalized (fixtures, tests).
    /// Wire data goes through [`Identity::try_new`].
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }

    pub fn steam(id: impl Into<String>) -> Self {
        Self::new(Platform::Steam, id)
    }

    pub fn eos(id: impl Into<String>) -> Self {
        Self::new(Platform::Eos, id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

/// Identities currently connected, rebuilt every cycle.
pub type Roster = BTreeSet<Identity>;

/// Identities listed in the remote ban manifest.
pub type BanSet = BTreeSet<Identity>;

/// One `<blacklisted .../>` element of the persisted store.
///
/// `platform` stays a raw string: entries written by server admins may use
/// tags this system does not know, and they are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub platform: String,
    pub userid: String,
    pub name: String,
    pub reason: String,
}

impl BlacklistEntry {
    /// Entry appended for a global ban match.
    pub fn global_ban(identity: &Identity) -> Self {
        Self {
            platform: identity.platform.as_str().to_string(),
            userid: identity.id.clone(),
            name: GLOBAL_BAN_NAME.to_string(),
            reason: GLOBAL_BAN_REASON.to_string(),
        }
    }

    /// Exact `(platform, userid)` comparison used for duplicate detection.
    pub fn is_for(&self, identity: &Identity) -> bool {
        self.platform == identity.platform.as_str() && self.userid == identity.id
    }
}
