use gbs_schemas::{BlacklistEntry, Identity};

/// What to append to the local blacklist for one set of matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdditionPlan {
    /// New entries, in match order. Never contains two entries for one identity.
    pub additions: Vec<BlacklistEntry>,
    /// Matches skipped because the blacklist already holds them.
    pub already_present: Vec<Identity>,
}

impl AdditionPlan {
    /// Nothing to write: the store must not be touched.
    pub fn is_noop(&self) -> bool {
        self.additions.is_empty()
    }
}
