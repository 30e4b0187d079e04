//! One reconciliation pass: fetch roster → fetch bans → match → persist.
//!
//! Source failures degrade to empty sets so a flaky endpoint never stops the
//! loop. The store is only opened when there is something to match, and it is
//! never recreated when it cannot be read.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use gbs_config::Settings;
use gbs_feed::{BanSource, HttpBanSource, HttpRosterSource, RosterSource};
use gbs_reconcile::{find_matches, plan_additions};
use gbs_schemas::{BanSet, Identity, Roster};
use gbs_store::BanStore;
use tracing::{error, info, warn};

/// What happened to the persisted store during a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Nobody online is globally banned; the store was not opened.
    NoMatches,
    /// Every match is already blacklisted; nothing was written.
    AlreadyPresent,
    /// This many entries were appended and written.
    Appended(usize),
    /// The store could not be read or parsed; nothing was written.
    ReadFailed(String),
    /// The updated store could not be written; next cycle retries.
    WriteFailed(String),
}

#[derive(Clone, Debug)]
pub struct CycleOutcome {
    pub started_at: DateTime<Utc>,
    pub roster_size: usize,
    pub ban_source_size: usize,
    pub matches: Vec<Identity>,
    pub store: StoreOutcome,
}

pub struct ReconcileCycle {
    roster: Box<dyn RosterSource>,
    bans: Box<dyn BanSource>,
    store_path: PathBuf,
}

impl ReconcileCycle {
    pub fn new(
        roster: Box<dyn RosterSource>,
        bans: Box<dyn BanSource>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            roster,
            bans,
            store_path: store_path.into(),
        }
    }

    /// HTTP sources and store path from validated settings.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = settings.request_timeout();
        let roster = HttpRosterSource::new(settings.roster_url.clone(), timeout)
            .context("roster source init failed")?;
        let bans = HttpBanSource::new(settings.banlist_url.clone(), timeout)
            .context("ban source init failed")?;
        Ok(Self::new(
            Box::new(roster),
            Box::new(bans),
            settings.store_path.clone(),
        ))
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub async fn run_once(&self) -> CycleOutcome {
        let started_at = Utc::now();
        info!(store = %self.store_path.display(), "checking online players against global ban list");

        let roster = self.fetch_roster().await;
        let bans = self.fetch_bans().await;
        let matches = find_matches(&roster, &bans);

        let store = if matches.is_empty() {
            info!("no matches found");
            StoreOutcome::NoMatches
        } else {
            let shown: Vec<String> = matches.iter().map(Identity::to_string).collect();
            warn!(count = matches.len(), matches = ?shown, "online players match the global ban list");
            self.persist(&matches)
        };

        CycleOutcome {
            started_at,
            roster_size: roster.len(),
            ban_source_size: bans.len(),
            matches,
            store,
        }
    }

    async fn fetch_roster(&self) -> Roster {
        match self.roster.fetch_roster().await {
            Ok(r) => r,
            Err(e) => {
                warn!(source = self.roster.source_name(), error = %e, "roster fetch failed; using empty roster");
                Roster::new()
            }
        }
    }

    async fn fetch_bans(&self) -> BanSet {
        match self.bans.fetch_bans().await {
            Ok(b) => b,
            Err(e) => {
                error!(source = self.bans.source_name(), error = %e, "ban manifest fetch failed; using empty ban set");
                BanSet::new()
            }
        }
    }

    fn persist(&self, matches: &[Identity]) -> StoreOutcome {
        let store = match BanStore::open(&self.store_path) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "ban store unreadable; skipping update this cycle");
                return StoreOutcome::ReadFailed(e.to_string());
            }
        };

        let plan = plan_additions(store.entries(), matches);
        if plan.is_noop() {
            info!(count = plan.already_present.len(), "all matches already blacklisted");
            return StoreOutcome::AlreadyPresent;
        }

        if let Err(e) = store.save(&plan.additions) {
            error!(error = %e, "ban store write failed; will retry next cycle");
            return StoreOutcome::WriteFailed(e.to_string());
        }

        for entry in &plan.additions {
            info!(platform = %entry.platform, userid = %entry.userid, "added to blacklist");
        }
        info!(added = plan.additions.len(), store = %self.store_path.display(), "ban store updated");
        StoreOutcome::Appended(plan.additions.len())
    }
}
