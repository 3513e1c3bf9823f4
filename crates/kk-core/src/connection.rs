//! Diagram connections: which anchors get a line between them.
//!
//! A connection pair names two anchors abstractly. Turning anchors into
//! screen positions is the host's job (see `kk-render::diagram`); here we
//! only decide *which* lines exist, as a pure function of the active layer,
//! the active key, and the prose shown in the info panel.

use crate::id::KeyId;
use crate::model::KeymapLayer;
use serde::Serialize;
use std::fmt;

/// The two kinds of diagram line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// From the title-bar key in the info panel to the selected board key.
    Selected,
    /// From an inline indicator in the prose to the board key it names.
    TextRef,
}

/// Something a diagram line can start or end at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Anchor {
    /// The copy of the active key in the navbar title bar.
    TitleKey,
    /// The handle inside a key on the board.
    KeyHandle { key: KeyId },
    /// The `index`-th indicator element in the info prose, pointing at `key`.
    Indicator { index: usize, key: KeyId },
}

/// A line to draw between two anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionPair {
    pub source: Anchor,
    pub target: Anchor,
    pub kind: ConnectionKind,
}

impl fmt::Display for ConnectionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} -> {:?})", self.kind, self.source, self.target)
    }
}

const INDICATOR_TAG: &str = "<keymap-indicator";

/// Key IDs named by `<keymap-indicator id="...">` elements, in document
/// order across all paragraphs.
pub fn indicator_ids(paragraphs: &[String]) -> Vec<String> {
    let mut ids = Vec::new();
    for paragraph in paragraphs {
        let mut rest = paragraph.as_str();
        while let Some(start) = rest.find(INDICATOR_TAG) {
            let after = &rest[start + INDICATOR_TAG.len()..];
            let tag_end = after.find('>').unwrap_or(after.len());
            if let Some(id) = attribute_value(&after[..tag_end], "id") {
                ids.push(id.to_string());
            }
            rest = &after[tag_end..];
        }
    }
    ids
}

/// Extract `name="value"` (or single-quoted) from the inside of a tag.
fn attribute_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = tag;
    while let Some(pos) = rest.find(name) {
        let before_ok = pos == 0 || rest[..pos].ends_with(char::is_whitespace);
        let after = rest[pos + name.len()..].trim_start();
        if before_ok && let Some(after_eq) = after.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let body = &after_eq[1..];
                return body.find(quote).map(|end| &body[..end]);
            }
        }
        rest = &rest[pos + name.len()..];
    }
    None
}

/// Derive every connection for the current view.
///
/// - The active key (if any) gets a `Selected` line from the title key.
/// - Each indicator in the prose gets a `TextRef` line to its key, unless it
///   points at the active key (that key already has the selected line) or at
///   a key the layer does not have.
pub fn derive_connections(
    layer: &KeymapLayer,
    active_key: Option<KeyId>,
    prose: &[String],
) -> Vec<ConnectionPair> {
    let mut pairs = Vec::new();

    if let Some(key) = active_key
        && layer.contains(key)
    {
        pairs.push(ConnectionPair {
            source: Anchor::TitleKey,
            target: Anchor::KeyHandle { key },
            kind: ConnectionKind::Selected,
        });
    }

    for (index, id) in indicator_ids(prose).iter().enumerate() {
        let Some(key) = KeyId::lookup(id).filter(|k| layer.contains(*k)) else {
            log::warn!("key indicator has no target on this layer: {id}");
            continue;
        };
        if Some(key) == active_key {
            log::debug!("indicator {index} points at the active key {key}; no text line");
            continue;
        }
        pairs.push(ConnectionPair {
            source: Anchor::Indicator { index, key },
            target: Anchor::KeyHandle { key },
            kind: ConnectionKind::TextRef,
        });
    }

    pairs
}
