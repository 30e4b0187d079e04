//! gbs-store
//!
//! Persisted ban store: the `<blacklist>` section of the game server's
//! `serveradmin.xml`.
//!
//! The store is handled as an explicit read → plan → write cycle:
//! [`BanStore::open`] parses the file and lists the existing entries, the
//! caller computes the additions (see `gbs-reconcile`), and
//! [`BanStore::save`] serializes the whole document with those additions
//! appended.
//!
//! Everything outside the blacklist container is streamed through unchanged,
//! so the rest of the admin file survives the rewrite. Only the XML
//! declaration is normalized.
//!
//! It does **not**:
//! - create a missing or unreadable file (that would drop existing bans)
//! - edit or remove entries that are already present

mod render;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gbs_schemas::BlacklistEntry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// Name of the single container element under the document root.
pub const CONTAINER_TAG: &str = "blacklist";

/// Name of each ban entry inside the container.
pub const ENTRY_TAG: &str = "blacklisted";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// The file could not be read (missing, permissions, not UTF-8).
    Read { path: PathBuf, source: io::Error },
    /// The file is not a well-formed document with a root element.
    Parse { path: PathBuf, message: String },
    /// Serializing the updated document failed.
    Render(String),
    /// The updated document could not be written back.
    Write { path: PathBuf, source: io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read { path, source } => {
                write!(f, "cannot read ban store {}: {source}", path.display())
            }
            StoreError::Parse { path, message } => {
                write!(f, "cannot parse ban store {}: {message}", path.display())
            }
            StoreError::Render(msg) => write!(f, "cannot render ban store: {msg}"),
            StoreError::Write { path, source } => {
                write!(f, "cannot write ban store {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Read { source, .. } | StoreError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BanStore
// ---------------------------------------------------------------------------

/// A parsed snapshot of the store file.
#[derive(Debug, Clone)]
pub struct BanStore {
    path: PathBuf,
    raw: String,
    entries: Vec<BlacklistEntry>,
    has_container: bool,
}

impl BanStore {
    /// Read and parse the store file. Fails rather than inventing a blank
    /// document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_xml(path, raw)
    }

    /// Parse an in-memory document that will be saved to `path`.
    pub fn from_xml(path: impl Into<PathBuf>, raw: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut raw = raw.into();
        if raw.starts_with('\u{feff}') {
            raw.replace_range(..'\u{feff}'.len_utf8(), "");
        }

        let (entries, has_container) =
            scan_entries(&raw).map_err(|message| StoreError::Parse {
                path: path.clone(),
                message,
            })?;
        debug!(path = %path.display(), entries = entries.len(), has_container, "ban store parsed");

        Ok(Self {
            path,
            raw,
            entries,
            has_container,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `blacklisted` children of the first top-level `blacklist` container.
    pub fn entries(&self) -> &[BlacklistEntry] {
        &self.entries
    }

    pub fn has_container(&self) -> bool {
        self.has_container
    }

    /// The full document with `additions` appended to the container.
    pub fn render(&self, additions: &[BlacklistEntry]) -> Result<Vec<u8>, StoreError> {
        render::render_document(&self.raw, additions)
    }

    /// Write the document back with `additions` appended. An empty slice
    /// leaves the file untouched.
    ///
    /// The new content goes to a temp file next to the resolved store (symlinks
    /// followed) and then replaces it, so a failed write never truncates
    /// existing bans. The store's permissions, and on unix its owner, carry
    /// over to the new file.
    pub fn save(&self, additions: &[BlacklistEntry]) -> Result<(), StoreError> {
        if additions.is_empty() {
            return Ok(());
        }
        let bytes = self.render(additions)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let target = fs::canonicalize(&self.path).map_err(write_err)?;
        let meta = fs::metadata(&target).map_err(write_err)?;
        let tmp = temp_path(&target);

        let result = fs::write(&tmp, &bytes)
            .and_then(|()| fs::set_permissions(&tmp, meta.permissions()))
            .and_then(|()| {
                copy_owner(&meta, &tmp);
                fs::rename(&tmp, &target)
            });
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        debug!(path = %self.path.display(), target = %target.display(), added = additions.len(), "ban store written");
        Ok(())
    }
}

#[cfg(unix)]
fn copy_owner(from: &fs::Metadata, to: &Path) {
    use std::os::unix::fs::MetadataExt;

    let Ok(current) = fs::metadata(to) else {
        return;
    };
    if current.uid() == from.uid() && current.gid() == from.gid() {
        return;
    }
    if let Err(e) = std::os::unix::fs::chown(to, Some(from.uid()), Some(from.gid())) {
        warn!(path = %to.display(), error = %e, "cannot keep ban store owner");
    }
}

#[cfg(not(unix))]
fn copy_owner(_from: &fs::Metadata, _to: &Path) {}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Collect entries of the first `<blacklist>` directly under the root and
/// check the document is well formed.
fn scan_entries(raw: &str) -> Result<(Vec<BlacklistEntry>, bool), String> {
    let mut reader = Reader::from_str(raw);
    let mut entries = Vec::new();
    let mut depth: usize = 0;
    let mut saw_root = false;
    let mut has_container = false;
    let mut in_container = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("xml error at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    if saw_root {
                        return Err("more than one root element".to_string());
                    }
                    saw_root = true;
                } else if depth == 1 && is_tag(&e, CONTAINER_TAG) && !has_container {
                    has_container = true;
                    in_container = true;
                } else if depth == 2 && in_container && is_tag(&e, ENTRY_TAG) {
                    entries.push(read_entry(&e)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if saw_root {
                        return Err("more than one root element".to_string());
                    }
                    saw_root = true;
                } else if depth == 1 && is_tag(&e, CONTAINER_TAG) && !has_container {
                    has_container = true;
                } else if depth == 2 && in_container && is_tag(&e, ENTRY_TAG) {
                    entries.push(read_entry(&e)?);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    in_container = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err("document has no root element".to_string());
    }
    if depth != 0 {
        return Err(format!("document truncated: {depth} element(s) left open"));
    }
    Ok((entries, has_container))
}

pub(crate) fn is_tag(e: &BytesStart<'_>, tag: &str) -> bool {
    e.name().as_ref() == tag.as_bytes()
}

fn read_entry(e: &BytesStart<'_>) -> Result<BlacklistEntry, String> {
    Ok(BlacklistEntry {
        platform: attr_or_empty(e, "platform")?,
        userid: attr_or_empty(e, "userid")?,
        name: attr_or_empty(e, "name")?,
        reason: attr_or_empty(e, "reason")?,
    })
}

fn attr_or_empty(e: &BytesStart<'_>, name: &str) -> Result<String, String> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| format!("bad attribute {name}: {err}"))?;
    match attr {
        Some(a) => a
            .unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| format!("bad attribute value {name}: {err}")),
        None => Ok(String::new()),
    }
}
