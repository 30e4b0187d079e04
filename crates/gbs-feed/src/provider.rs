//! Source boundary for the two remote reads.
//!
//! Defines the source traits, the shared error type and the bounded-timeout
//! HTTP plumbing both concrete sources use. Parsing lives in `roster.rs` and
//! `banlist.rs`.

use std::fmt;
use std::time::Duration;

use gbs_schemas::{BanSet, Roster};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a source may return. All of them are transient from the cycle's
/// point of view: the cycle logs and continues with an empty result.
#[derive(Debug)]
pub enum FeedError {
    /// Connection, DNS, TLS or body-read failure.
    Transport(String),
    /// The per-request timeout elapsed.
    Timeout { url: String },
    /// The server answered with a non-2xx status.
    Status { code: u16, url: String },
    /// The payload could not be decoded (bad JSON / XML / shape).
    Decode(String),
    /// The HTTP client could not be constructed.
    Config(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Transport(msg) => write!(f, "transport error: {msg}"),
            FeedError::Timeout { url } => write!(f, "request timed out: {url}"),
            FeedError::Status { code, url } => write!(f, "http status {code} from {url}"),
            FeedError::Decode(msg) => write!(f, "decode error: {msg}"),
            FeedError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

impl FeedError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout {
                url: url.to_string(),
            }
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

/// Live roster of connected players.
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_roster(&self) -> Result<Roster, FeedError>;
}

/// Global ban manifest.
#[async_trait::async_trait]
pub trait BanSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_bans(&self) -> Result<BanSet, FeedError>;
}

// ---------------------------------------------------------------------------
// HTTP plumbing
// ---------------------------------------------------------------------------

/// Client whose every request (connect + body) is bounded by `timeout`.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, FeedError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FeedError::Config(format!("http client build failed: {e}")))
}

/// Single GET; non-2xx is an error, the body is returned as text.
pub(crate) async fn get_text(http: &reqwest::Client, url: &str) -> Result<String, FeedError> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| FeedError::from_reqwest(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            code: status.as_u16(),
            url: url.to_string(),
        });
    }

    resp.text()
        .await
        .map_err(|e| FeedError::from_reqwest(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRoster(Roster);

    #[async_trait::async_trait]
    impl RosterSource for FixedRoster {
        fn source_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_roster(&self) -> Result<Roster, FeedError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn roster_source_is_object_safe_via_box() {
        let _s: Box<dyn RosterSource> = Box::new(FixedRoster(Roster::new()));
    }

    #[test]
    fn feed_error_display_status() {
        let err = FeedError::Status {
            code: 503,
            url: "http://x/api".to_string(),
        };
        assert_eq!(err.to_string(), "http status 503 from http://x/api");
    }

    #[test]
    fn feed_error_display_timeout() {
        let err = FeedError::Timeout {
            url: "http://x/api".to_string(),
        };
        assert_eq!(err.to_string(), "request timed out: http://x/api");
    }

    #[test]
    fn feed_error_display_decode() {
        let err = FeedError::Decode("not json".to_string());
        assert_eq!(err.to_string(), "decode error: not json");
    }

    #[test]
    fn http_client_builds_with_timeout() {
        assert!(http_client(Duration::from_secs(10)).is_ok());
    }
}
