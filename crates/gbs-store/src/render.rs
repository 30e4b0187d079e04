//! Serialize the store document with new entries appended.
//!
//! Events from the original document are streamed to the writer verbatim.
//! New `blacklisted` elements are spliced in at exactly one place:
//! - before `</blacklist>` of the first top-level container, or
//! - inside a self-closing `<blacklist/>`, which is expanded in place, or
//! - as a new `<blacklist>` container right before the root's end tag.
//!
//! Whitespace-only text is held back one event so new elements can be placed
//! before the indentation of a closing tag, keeping the file readable. New
//! lines reuse the document's line ending and indent step when it has them.

use gbs_schemas::BlacklistEntry;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{is_tag, StoreError, CONTAINER_TAG, ENTRY_TAG};

const DEFAULT_INDENT: &str = "    ";

pub(crate) fn render_document(
    raw: &str,
    additions: &[BlacklistEntry],
) -> Result<Vec<u8>, StoreError> {
    let layout = Layout::detect(raw);
    let mut reader = Reader::from_str(raw);
    let mut w = Writer::new(Vec::new());

    emit(
        &mut w,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut first_event = true;
    let mut depth: usize = 0;
    let mut container_seen = false;
    let mut in_container = false;
    // Pending whitespace-only text, written before the next event.
    let mut pending_ws: Option<String> = None;
    // Indentation (text after the last newline) preceding the current element.
    let mut root_child_indent: Option<String> = None;
    let mut container_indent = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| StoreError::Render(format!("xml error: {e}")))?;

        if first_event {
            first_event = false;
            match &event {
                // Replaced by the declaration written above.
                Event::Decl(_) => continue,
                Event::Text(t) if is_whitespace(t) => {}
                _ => emit(&mut w, Event::Text(BytesText::from_escaped(layout.newline)))?,
            }
        }

        match event {
            Event::Text(t) if is_whitespace(&t) => {
                let s = String::from_utf8_lossy(&t).into_owned();
                match pending_ws.as_mut() {
                    Some(p) => p.push_str(&s),
                    None => pending_ws = Some(s),
                }
            }
            Event::Start(e) => {
                let indent = line_indent(pending_ws.as_deref());
                flush_ws(&mut w, &mut pending_ws)?;
                if depth == 1 {
                    root_child_indent.get_or_insert_with(|| indent.clone());
                    if is_tag(&e, CONTAINER_TAG) && !container_seen {
                        container_seen = true;
                        in_container = true;
                        container_indent = indent;
                    }
                }
                emit(&mut w, Event::Start(e))?;
                depth += 1;
            }
            Event::Empty(e) => {
                let indent = line_indent(pending_ws.as_deref());
                flush_ws(&mut w, &mut pending_ws)?;
                if depth == 0 && !additions.is_empty() {
                    // Self-closing root: open it so the container fits inside.
                    let root_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let indent = layout.child("");
                    emit(&mut w, Event::Start(e))?;
                    emit_newline_indent(&mut w, &layout, &indent)?;
                    write_container(&mut w, &layout, &indent, additions, layout.newline)?;
                    emit(&mut w, Event::End(BytesEnd::new(root_name)))?;
                    container_seen = true;
                    continue;
                }
                if depth == 1 {
                    root_child_indent.get_or_insert_with(|| indent.clone());
                    if is_tag(&e, CONTAINER_TAG) && !container_seen {
                        container_seen = true;
                        if !additions.is_empty() {
                            let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                            emit(&mut w, Event::Start(e))?;
                            let child = layout.child(&indent);
                            write_entries(&mut w, &layout, &child, additions)?;
                            emit_newline_indent(&mut w, &layout, &indent)?;
                            emit(&mut w, Event::End(BytesEnd::new(name)))?;
                            continue;
                        }
                    }
                }
                emit(&mut w, Event::Empty(e))?;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);

                if depth == 1 && in_container {
                    in_container = false;
                    if !additions.is_empty() {
                        let child = layout.child(&container_indent);
                        write_entries(&mut w, &layout, &child, additions)?;
                        if pending_ws.is_none() {
                            pending_ws = Some(format!("{}{container_indent}", layout.newline));
                        }
                    }
                } else if depth == 0 && !container_seen && !additions.is_empty() {
                    container_seen = true;
                    let indent = root_child_indent
                        .clone()
                        .unwrap_or_else(|| layout.child(""));
                    let close = pending_ws
                        .take()
                        .unwrap_or_else(|| layout.newline.to_string());
                    emit_newline_indent(&mut w, &layout, &indent)?;
                    write_container(&mut w, &layout, &indent, additions, &close)?;
                    emit(&mut w, Event::End(e))?;
                    continue;
                }

                flush_ws(&mut w, &mut pending_ws)?;
                emit(&mut w, Event::End(e))?;
            }
            Event::Eof => {
                flush_ws(&mut w, &mut pending_ws)?;
                break;
            }
            other => {
                flush_ws(&mut w, &mut pending_ws)?;
                emit(&mut w, other)?;
            }
        }
    }

    Ok(w.into_inner())
}

/// `<blacklist>` + entries + `</blacklist>` followed by `close` whitespace.
fn write_container(
    w: &mut Writer<Vec<u8>>,
    layout: &Layout,
    indent: &str,
    additions: &[BlacklistEntry],
    close: &str,
) -> Result<(), StoreError> {
    emit(w, Event::Start(BytesStart::new(CONTAINER_TAG)))?;
    write_entries(w, layout, &layout.child(indent), additions)?;
    emit_newline_indent(w, layout, indent)?;
    emit(w, Event::End(BytesEnd::new(CONTAINER_TAG)))?;
    emit(w, Event::Text(BytesText::from_escaped(close)))
}

fn write_entries(
    w: &mut Writer<Vec<u8>>,
    layout: &Layout,
    indent: &str,
    additions: &[BlacklistEntry],
) -> Result<(), StoreError> {
    for entry in additions {
        emit_newline_indent(w, layout, indent)?;
        let mut el = BytesStart::new(ENTRY_TAG);
        el.push_attribute(("platform", entry.platform.as_str()));
        el.push_attribute(("userid", entry.userid.as_str()));
        el.push_attribute(("name", entry.name.as_str()));
        el.push_attribute(("reason", entry.reason.as_str()));
        emit(w, Event::Empty(el))?;
    }
    Ok(())
}

fn emit_newline_indent(
    w: &mut Writer<Vec<u8>>,
    layout: &Layout,
    indent: &str,
) -> Result<(), StoreError> {
    let s = format!("{}{indent}", layout.newline);
    emit(w, Event::Text(BytesText::from_escaped(s)))
}

fn flush_ws(w: &mut Writer<Vec<u8>>, pending: &mut Option<String>) -> Result<(), StoreError> {
    match pending.take() {
        Some(s) => emit(w, Event::Text(BytesText::from_escaped(s))),
        None => Ok(()),
    }
}

fn emit(w: &mut Writer<Vec<u8>>, ev: Event<'_>) -> Result<(), StoreError> {
    w.write_event(ev)
        .map_err(|e| StoreError::Render(e.to_string()))
}

fn is_whitespace(t: &[u8]) -> bool {
    t.iter().all(|b| b.is_ascii_whitespace())
}

/// Indentation of the line an element starts on, from the whitespace before it.
fn line_indent(ws: Option<&str>) -> String {
    match ws {
        Some(s) => match s.rfind('\n') {
            Some(i) => s[i + 1..].to_string(),
            None => s.to_string(),
        },
        None => String::new(),
    }
}

/// Line ending and indent step used for lines this module writes.
struct Layout {
    newline: &'static str,
    /// Indent added per nesting level, from the first element that starts a
    /// line deeper than its parent.
    unit: Option<String>,
}

impl Layout {
    fn detect(raw: &str) -> Self {
        let newline = if raw.contains("\r\n") { "\r\n" } else { "\n" };
        let mut reader = Reader::from_str(raw);
        // Indent of each open element.
        let mut open: Vec<String> = Vec::new();
        let mut ws: Option<String> = None;
        let mut unit = None;

        while unit.is_none() {
            let Ok(event) = reader.read_event() else {
                break;
            };
            let is_start = matches!(event, Event::Start(_));
            match event {
                Event::Text(t) if is_whitespace(&t) => {
                    ws = Some(String::from_utf8_lossy(&t).into_owned());
                }
                Event::Start(_) | Event::Empty(_) => {
                    let starts_line = ws.as_deref().is_some_and(|s| s.contains('\n'));
                    let indent = line_indent(ws.take().as_deref());
                    if starts_line {
                        if let Some(parent) = open.last() {
                            if indent.len() > parent.len() && indent.starts_with(parent.as_str()) {
                                unit = Some(indent[parent.len()..].to_string());
                            }
                        }
                    }
                    if is_start {
                        open.push(indent);
                    }
                }
                Event::End(_) => {
                    ws = None;
                    open.pop();
                }
                Event::Eof => break,
                _ => ws = None,
            }
        }

        Self { newline, unit }
    }

    /// Indent for a child of an element indented by `parent`.
    fn child(&self, parent: &str) -> String {
        let unit = match &self.unit {
            Some(u) => u.as_str(),
            None if parent.contains('\t') => "\t",
            None => DEFAULT_INDENT,
        };
        format!("{parent}{unit}")
    }
}
