//! gbs-config
//!
//! Layered YAML configuration for the global-ban sync daemon.
//!
//! YAML documents are merged in order (later documents override earlier ones),
//! validated, and hashed so the effective configuration can be identified in
//! logs. Every key has a default, so an empty layer list is a valid config.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Env var holding a comma-separated list of YAML layers.
pub const ENV_CONFIG_PATHS: &str = "GBS_CONFIG";

/// Layer used when `GBS_CONFIG` is unset. Skipped silently if absent.
pub const DEFAULT_CONFIG_PATH: &str = "config/globalban.yaml";

pub const DEFAULT_ROSTER_URL: &str = "http://127.0.0.1:8080/api/getplayersonline";
pub const DEFAULT_BANLIST_URL: &str =
    "https://raw.githubusercontent.com/sLimLong/banlist/main/banlist.xml";
pub const DEFAULT_STORE_PATH: &str = "serveradmin.xml";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3600;

/// Typed settings consumed by the feed sources, the store and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Live roster endpoint (JSON array of connected players).
    pub roster_url: String,
    /// Remote global ban manifest (XML).
    pub banlist_url: String,
    /// Local `serveradmin.xml` that receives new `blacklisted` entries.
    pub store_path: String,
    /// Per-request timeout applied to each of the two HTTP reads.
    pub request_timeout_secs: u64,
    /// Idle time between the end of one cycle and the start of the next.
    pub cycle_interval_secs: u64,
    /// Append log output to this file instead of stdout.
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            roster_url: DEFAULT_ROSTER_URL.to_string(),
            banlist_url: DEFAULT_BANLIST_URL.to_string(),
            store_path: DEFAULT_STORE_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cycle_interval_secs: DEFAULT_CYCLE_INTERVAL_SECS,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// Reject settings that would make every cycle fail or spin.
    pub fn validate(&self) -> Result<()> {
        check_http_url("roster_url", &self.roster_url)?;
        check_http_url("banlist_url", &self.banlist_url)?;
        if self.store_path.trim().is_empty() {
            bail!("CONFIG_INVALID store_path must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("CONFIG_INVALID request_timeout_secs must be > 0");
        }
        if self.cycle_interval_secs == 0 {
            bail!("CONFIG_INVALID cycle_interval_secs must be > 0");
        }
        if let Some(f) = &self.log_file {
            if f.trim().is_empty() {
                bail!("CONFIG_INVALID log_file must not be empty when set");
            }
        }
        Ok(())
    }
}

fn check_http_url(key: &str, v: &str) -> Result<()> {
    let t = v.trim();
    let rest = t
        .strip_prefix("http://")
        .or_else(|| t.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => bail!("CONFIG_INVALID {key} must be an http(s) URL, got {v:?}"),
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub settings: Settings,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses to null; it must not wipe earlier layers.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    let settings: Settings =
        serde_json::from_value(merged.clone()).context("config does not match Settings")?;
    settings.validate()?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        settings,
    })
}

/// Resolve layers from `GBS_CONFIG` (explicit layers must exist) or fall back
/// to [`DEFAULT_CONFIG_PATH`] when it is present on disk.
pub fn load_from_env() -> Result<LoadedConfig> {
    match std::env::var(ENV_CONFIG_PATHS) {
        Ok(v) => {
            let paths = split_path_list(&v);
            load_layered_yaml(&paths)
        }
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_layered_yaml(&[DEFAULT_CONFIG_PATH])
        }
        Err(_) => load_layered_yaml_from_strings(&[]),
    }
}

pub fn split_path_list(v: &str) -> Vec<&str> {
    v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layer_list_yields_defaults() {
        let cfg = load_layered_yaml_from_strings(&[]).unwrap();
        assert_eq!(cfg.settings, Settings::default());
        assert_eq!(cfg.settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.settings.cycle_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn empty_document_does_not_reset_earlier_layers() {
        let cfg = load_layered_yaml_from_strings(&["store_path: a.xml", ""]).unwrap();
        assert_eq!(cfg.settings.store_path, "a.xml");
    }

    #[test]
    fn split_path_list_drops_blanks() {
        assert_eq!(split_path_list(" a.yaml, ,b.yaml,"), vec!["a.yaml", "b.yaml"]);
    }

    #[test]
    fn url_check_requires_scheme_and_host() {
        assert!(check_http_url("k", "https://x").is_ok());
        assert!(check_http_url("k", "http://").is_err());
        assert!(check_http_url("k", "ftp://x").is_err());
    }
}
