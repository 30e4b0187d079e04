//! Online roster: who is connected right now.
//!
//! The roster API returns a JSON array of player records. A record may carry
//! `steamid`, `crossplatformid`, both, or neither; any other shape is
//! tolerated and simply contributes nothing.

use std::time::Duration;

use gbs_schemas::{Identity, Platform, Roster};
use serde_json::Value;
use tracing::{debug, info};

use crate::normalizer::identity_from_raw;
use crate::provider::{get_text, http_client, FeedError, RosterSource};

/// Record key holding the Steam id (`Steam_7656...`).
pub const STEAM_KEY: &str = "steamid";

/// Record key holding the cross-platform (EOS) id (`EOS_0002...`).
pub const CROSSPLATFORM_KEY: &str = "crossplatformid";

/// Extract the roster from a roster API response body.
pub fn parse_roster(body: &str) -> Result<Roster, FeedError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FeedError::Decode(format!("roster json decode failed: {e}")))?;

    let Value::Array(records) = value else {
        return Err(FeedError::Decode(
            "roster response is not a JSON array".to_string(),
        ));
    };

    let mut roster = Roster::new();
    for rec in &records {
        roster.extend(identities_in_record(rec));
    }
    Ok(roster)
}

/// Zero, one or two identities for a single player record.
fn identities_in_record(rec: &Value) -> Vec<Identity> {
    let mut out = Vec::with_capacity(2);
    for (key, platform) in [(STEAM_KEY, Platform::Steam), (CROSSPLATFORM_KEY, Platform::Eos)] {
        // Non-object records and non-string values fall through as `None`.
        if let Some(raw) = rec.get(key).and_then(Value::as_str) {
            if let Some(id) = identity_from_raw(platform.as_str(), raw) {
                out.push(id);
            }
        }
    }
    out
}

/// Roster API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRosterSource {
    http: reqwest::Client,
    url: String,
}

impl HttpRosterSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl RosterSource for HttpRosterSource {
    fn source_name(&self) -> &'static str {
        "roster_api"
    }

    async fn fetch_roster(&self) -> Result<Roster, FeedError> {
        let body = get_text(&self.http, &self.url).await?;
        debug!(url = %self.url, raw = %body, "roster api raw response");

        let roster = parse_roster(&body)?;
        let ids: Vec<String> = roster.iter().map(Identity::to_string).collect();
        info!(count = roster.len(), players = ?ids, "online roster normalized");
        Ok(roster)
    }
}
