//! Global ban manifest.
//!
//! The manifest is an XML document listing banned accounts in two record
//! shapes, legacy `<user platform=".." userid=".."/>` and
//! `<blacklisted platform=".." userid=".." .../>`. Both may appear at any depth
//! and are merged into one set with identical meaning.

use std::time::Duration;

use gbs_schemas::{BanSet, Identity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::info;

use crate::normalizer::identity_from_raw;
use crate::provider::{get_text, http_client, BanSource, FeedError};

/// Extract every Steam/EOS ban record from a manifest document.
pub fn parse_ban_manifest(xml: &str) -> Result<BanSet, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut bans = BanSet::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            FeedError::Decode(format!(
                "ban manifest xml error at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                saw_root = true;
                depth += 1;
                collect_record(&e, &mut bans)?;
            }
            Event::Empty(e) => {
                saw_root = true;
                collect_record(&e, &mut bans)?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FeedError::Decode(
            "ban manifest has no root element".to_string(),
        ));
    }
    if depth != 0 {
        return Err(FeedError::Decode(format!(
            "ban manifest truncated: {depth} element(s) left open"
        )));
    }
    Ok(bans)
}

fn collect_record(e: &BytesStart<'_>, bans: &mut BanSet) -> Result<(), FeedError> {
    if !matches!(e.name().as_ref(), b"user" | b"blacklisted") {
        return Ok(());
    }
    let platform = attr_value(e, "platform")?;
    let userid = attr_value(e, "userid")?;
    if let (Some(platform), Some(userid)) = (platform, userid) {
        if let Some(id) = identity_from_raw(&platform, &userid) {
            bans.insert(id);
        }
    }
    Ok(())
}

fn attr_value(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, FeedError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| FeedError::Decode(format!("bad attribute {name}: {err}")))?;
    match attr {
        Some(a) => a
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|err| FeedError::Decode(format!("bad attribute value {name}: {err}"))),
        None => Ok(None),
    }
}

/// Ban manifest over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBanSource {
    http: reqwest::Client,
    url: String,
}

impl HttpBanSource {
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
impl BanSource for HttpBanSource {
    fn source_name(&self) -> &'static str {
        "global_banlist"
    }

    async fn fetch_bans(&self) -> Result<BanSet, FeedError> {
        let body = get_text(&self.http, &self.url).await?;
        let bans = parse_ban_manifest(&body)?;
        info!(url = %self.url, count = bans.len(), "global ban manifest loaded");
        Ok(bans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_record_shapes_anywhere_in_tree() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<banlist>
  <users>
    <user platform="Steam" userid="Steam_999"/>
  </users>
  <section><deeper>
    <blacklisted platform="EOS" userid="EOS_888" name="x" reason="cheat"></blacklisted>
  </deeper></section>
</banlist>"#;
        let bans = parse_ban_manifest(xml).unwrap();
        let want: BanSet = [Identity::steam("999"), Identity::eos("888")]
            .into_iter()
            .collect();
        assert_eq!(bans, want);
    }

    #[test]
    fn same_identity_in_both_shapes_is_deduplicated() {
        let xml = r#"<root>
  <user platform="Steam" userid="Steam_1"/>
  <blacklisted platform="Steam" userid="1"/>
</root>"#;
        assert_eq!(parse_ban_manifest(xml).unwrap().len(), 1);
    }

    #[test]
    fn unknown_platform_and_missing_attrs_are_skipped() {
        let xml = r#"<root>
  <user platform="XBL" userid="123"/>
  <user platform="steam" userid="Steam_5"/>
  <user platform="Steam"/>
  <blacklisted userid="EOS_1"/>
  <blacklisted platform="EOS" userid=""/>
  <player platform="Steam" userid="Steam_7"/>
</root>"#;
        assert!(parse_ban_manifest(xml).unwrap().is_empty());
    }

    #[test]
    fn escaped_attribute_values_are_unescaped() {
        let xml = r#"<root><user platform="Steam" userid="Steam_a&amp;b"/></root>"#;
        let bans = parse_ban_manifest(xml).unwrap();
        assert!(bans.contains(&Identity::steam("a&b")));
    }

    #[test]
    fn mismatched_end_tag_is_decode_error() {
        let err = parse_ban_manifest("<root><users></root>").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
    }

    #[test]
    fn unclosed_document_is_decode_error() {
        let err = parse_ban_manifest("<root><user platform=\"Steam\" userid=\"1\"/>").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
    }

    #[test]
    fn empty_document_is_decode_error() {
        assert!(matches!(
            parse_ban_manifest("").unwrap_err(),
            FeedError::Decode(_)
        ));
    }
}
