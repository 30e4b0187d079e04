use std::collections::BTreeSet;

use gbs_schemas::{BanSet, BlacklistEntry, Identity, Roster};

use crate::AdditionPlan;

/// Connected identities that are globally banned, in ascending identity order.
///
/// Same inputs always give the same output, independent of how either set was
/// built.
pub fn find_matches(roster: &Roster, bans: &BanSet) -> Vec<Identity> {
    roster.intersection(bans).cloned().collect()
}

/// Entries to append for `matches`, given what the blacklist already holds.
///
/// A match is skipped when an existing entry has exactly the same
/// `(platform, userid)`, or when it repeats an earlier match in this call.
pub fn plan_additions(existing: &[BlacklistEntry], matches: &[Identity]) -> AdditionPlan {
    let mut plan = AdditionPlan::default();
    let mut planned: BTreeSet<&Identity> = BTreeSet::new();

    for m in matches {
        if existing.iter().any(|e| e.is_for(m)) {
            plan.already_present.push(m.clone());
            continue;
        }
        if !planned.insert(m) {
            continue;
        }
        plan.additions.push(BlacklistEntry::global_ban(m));
    }

    plan
}
