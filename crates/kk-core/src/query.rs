//! Query-string synchronization.
//!
//! Reading merges three sources into one `StateIdArgs`, with precedence
//! query string > element attribute > existing state. Writing does the
//! reverse: it emits only the parameters whose value deviates from the
//! element's attributes, leaving every unrelated parameter untouched.
//!
//! Parameter names are `{prefix}-map`, `{prefix}-layer`, `{prefix}-key`,
//! `{prefix}-guide`, `{prefix}-step`, plus the unprefixed `debug`. With an
//! empty prefix the query string is neither read nor written.

use crate::state::{StateChangeMap, StateIdArgs, StateSnapshot};
use serde::Deserialize;
use std::fmt;
use winnow::combinator::{opt, preceded, separated};
use winnow::prelude::*;
use winnow::token::take_till;

// ─── Query parameters ────────────────────────────────────────────────────

/// Ordered `name=value` pairs, percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

type RawPair<'a> = (&'a str, Option<&'a str>);

fn parse_pair<'a>(input: &mut &'a str) -> ModalResult<RawPair<'a>> {
    (
        take_till(0.., ['=', '&']),
        opt(preceded('=', take_till(0.., '&'))),
    )
        .parse_next(input)
}

fn parse_pairs<'a>(input: &mut &'a str) -> ModalResult<Vec<RawPair<'a>>> {
    separated(0.., parse_pair, '&').parse_next(input)
}

impl QueryParams {
    /// Parse a search string, with or without the leading `?`.
    pub fn parse(search: &str) -> Self {
        let mut input = search.strip_prefix('?').unwrap_or(search);
        let raw = match parse_pairs.parse_next(&mut input) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("unparsable query string {search:?}: {e:?}");
                Vec::new()
            }
        };
        let pairs = raw
            .into_iter()
            .filter(|(name, value)| !(name.is_empty() && value.is_none()))
            .map(|(name, value)| (decode(name), decode(value.unwrap_or(""))))
            .collect();
        Self { pairs }
    }

    /// The first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first `name` in place and drop any others, or append.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(n, _)| n == name) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut idx = 0;
                self.pairs.retain(|(n, _)| {
                    let keep = idx <= first || n != name;
                    idx += 1;
                    keep
                });
            }
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.pairs.retain(|(n, _)| n != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `path` or `path?query`.
    pub fn to_url(&self, pathname: &str) -> String {
        if self.is_empty() {
            pathname.to_string()
        } else {
            format!("{pathname}?{self}")
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", encode(name), encode(value))?;
        }
        Ok(())
    }
}

/// Form-urlencoded decoding; malformed escapes are kept literally.
fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = |b: u8| (b as char).to_digit(16);
                match (bytes.get(i + 1).copied().and_then(hex), bytes.get(i + 2).copied().and_then(hex)) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'*' | b'-' | b'.' | b'_' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

// ─── Element attributes ──────────────────────────────────────────────────

/// The configuration attributes of a keymap UI root, as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ElementAttributes {
    pub debug: Option<String>,
    pub keymap_id: Option<String>,
    pub layer: Option<String>,
    pub selected_key: Option<String>,
    pub query_prefix: Option<String>,
    /// Write baseline only; never read into the state.
    pub guide_id: Option<String>,
    /// Write baseline only; never read into the state.
    pub guide_step: Option<String>,
}

/// Attributes a host may change at runtime.
pub const OBSERVED_ATTRIBUTES: [&str; 5] = ["debug", "keymap-id", "layer", "query-prefix", "selected-key"];

impl ElementAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "debug" => self.debug.as_deref(),
            "keymap-id" => self.keymap_id.as_deref(),
            "layer" => self.layer.as_deref(),
            "selected-key" => self.selected_key.as_deref(),
            "query-prefix" => self.query_prefix.as_deref(),
            "guide-id" => self.guide_id.as_deref(),
            "guide-step" => self.guide_step.as_deref(),
            _ => None,
        }
    }

    /// Set or remove an attribute. Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: Option<String>) -> bool {
        let slot = match name {
            "debug" => &mut self.debug,
            "keymap-id" => &mut self.keymap_id,
            "layer" => &mut self.layer,
            "selected-key" => &mut self.selected_key,
            "query-prefix" => &mut self.query_prefix,
            "guide-id" => &mut self.guide_id,
            "guide-step" => &mut self.guide_step,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Debug level; anything unparsable is 0.
    pub fn debug_level(&self) -> u32 {
        self.debug
            .as_deref()
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(0)
    }

    /// The state fields these attributes ask for.
    pub fn state_args(&self) -> StateIdArgs {
        StateIdArgs {
            keymap_id: self.keymap_id.clone(),
            layer_idx: self.layer.as_deref().map(|l| parse_int(l).unwrap_or(0)),
            selected_key: self.selected_key.clone(),
            debug: self.debug.as_ref().map(|_| self.debug_level()),
            query_prefix: self.query_prefix.clone(),
            ..StateIdArgs::default()
        }
    }

    fn baseline_int(&self, value: &Option<String>) -> i64 {
        value.as_deref().and_then(parse_int).unwrap_or(0)
    }
}

fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}

/// The layout a URL without `{P}-map` stands for: the `keymap-id`
/// attribute if set, else the default layout.
pub fn keymap_baseline<'a>(attrs: &'a ElementAttributes, default_keymap_id: &'a str) -> &'a str {
    attrs
        .keymap_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(default_keymap_id)
}

// ─── Reading ─────────────────────────────────────────────────────────────

/// Merge attributes and the query string into update arguments.
///
/// `attrs` is passed only on initial connection, so that attributes set the
/// baseline before the query string overrides them. With
/// `explicit_defaults` (history navigation) a missing parameter resets its
/// field: the `keymap_baseline` layout, no key, layer 0, no guide, step 0.
/// `keymap_baseline` is the layout a URL without `{P}-map` stands for (see
/// [`keymap_baseline`]); it is ignored without `explicit_defaults`.
pub fn read_state_args(
    search: &str,
    state_prefix: &str,
    keymap_baseline: &str,
    attrs: Option<&ElementAttributes>,
    explicit_defaults: bool,
) -> StateIdArgs {
    let attr_args = attrs.map(ElementAttributes::state_args).unwrap_or_default();
    let prefix = attr_args.query_prefix.as_deref().unwrap_or(state_prefix);

    let mut qs = StateIdArgs::default();
    if !prefix.is_empty() {
        let params = QueryParams::parse(search);
        let present = |name: &str| params.get(name).filter(|v| !v.is_empty());
        let named = |suffix: &str| present(&format!("{prefix}-{suffix}"));

        if let Some(debug) = present("debug") {
            qs.debug = Some(u32::from(debug == "true"));
        }
        if let Some(map) = named("map") {
            qs.keymap_id = Some(map.to_string());
        } else if explicit_defaults && !keymap_baseline.is_empty() {
            qs.keymap_id = Some(keymap_baseline.to_string());
        }
        let key = named("key").map(str::to_string);
        let layer = named("layer").and_then(parse_int);
        let guide = named("guide").map(str::to_string);
        let step = named("step").and_then(parse_int);

        if explicit_defaults {
            qs.selected_key = Some(key.unwrap_or_default());
            qs.layer_idx = Some(layer.unwrap_or(0));
            qs.guide_id = Some(guide);
            qs.guide_step_idx = Some(step.unwrap_or(0));
        } else {
            qs.selected_key = key;
            qs.layer_idx = layer;
            qs.guide_id = guide.map(Some);
            qs.guide_step_idx = step;
        }
    }

    attr_args.overridden_by(qs)
}

// ─── Writing ─────────────────────────────────────────────────────────────

/// How a URL update enters the browser history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// New history entry; for direct user input.
    Push,
    /// Silent update of the current entry.
    Replace,
}

impl NavigationMode {
    /// `None` if no URL-mirrored field changed.
    pub fn for_changes(changes: &StateChangeMap) -> Option<Self> {
        let mut url_changes = changes.iter().filter(|c| c.field.is_url_field()).peekable();
        url_changes.peek()?;
        if url_changes.any(|c| c.metadata.is_user_initiated) {
            Some(NavigationMode::Push)
        } else {
            Some(NavigationMode::Replace)
        }
    }
}

/// Compute the URL that represents `snapshot`, or `None` if it equals the
/// current URL (or the query string is disabled).
pub fn write_query(
    snapshot: &StateSnapshot,
    attrs: &ElementAttributes,
    pathname: &str,
    search: &str,
) -> Option<String> {
    let prefix = snapshot.query_prefix.as_str();
    if prefix.is_empty() {
        return None;
    }
    let mut params = QueryParams::parse(search);
    let name = |suffix: &str| format!("{prefix}-{suffix}");

    let a_layer = attrs.baseline_int(&attrs.layer);
    let a_key = attrs.selected_key.as_deref().unwrap_or("");
    let a_guide = attrs.guide_id.as_deref().unwrap_or("");
    let a_step = attrs.baseline_int(&attrs.guide_step);

    let map = &snapshot.keymap_id;
    if !map.is_empty() && map != keymap_baseline(attrs, &snapshot.default_keymap_id) {
        params.set(&name("map"), map.as_str());
    } else {
        params.delete(&name("map"));
    }

    if a_layer != snapshot.layer_idx as i64 {
        params.set(&name("layer"), snapshot.layer_idx.to_string());
    } else {
        params.delete(&name("layer"));
    }

    match snapshot.selected_key.as_deref() {
        Some(key) if !key.is_empty() && key != a_key => params.set(&name("key"), key),
        _ => params.delete(&name("key")),
    }

    match snapshot.guide_id.as_deref() {
        Some(guide) if guide != a_guide => params.set(&name("guide"), guide),
        _ => params.delete(&name("guide")),
    }

    match snapshot.guide_step_idx {
        Some(step) if step as i64 != a_step => params.set(&name("step"), step.to_string()),
        _ => params.delete(&name("step")),
    }

    let new_url = params.to_url(pathname);
    let current_url = format!("{pathname}{search}");
    (new_url != current_url).then_some(new_url)
}

/// Drop every parameter that belongs to `old_prefix`, returning the new URL.
pub fn strip_prefixed(old_prefix: &str, pathname: &str, search: &str) -> String {
    let mut params = QueryParams::parse(search);
    for suffix in ["map", "layer", "key", "guide", "step"] {
        params.delete(&format!("{old_prefix}-{suffix}"));
    }
    params.to_url(pathname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot() -> StateSnapshot {
        StateSnapshot {
            keymap_id: "main".into(),
            default_keymap_id: "main".into(),
            layer_idx: 0,
            selected_key: None,
            guide_id: None,
            guide_step_idx: None,
            debug: 0,
            query_prefix: "kk".into(),
        }
    }

    #[test]
    fn parse_decodes_and_keeps_order() {
        let p = QueryParams::parse("?b=2&a=hello+world&c=%2Fx%zz&flag");
        assert_eq!(p.get("a"), Some("hello world"));
        assert_eq!(p.get("c"), Some("/x%zz"));
        assert_eq!(p.get("flag"), Some(""));
        assert_eq!(p.to_string(), "b=2&a=hello+world&c=%2Fx%25zz&flag=");
    }

    #[test]
    fn parse_skips_empty_segments() {
        let p = QueryParams::parse("a=1&&b=2&");
        assert_eq!(p.len(), 2);
        assert!(QueryParams::parse("").is_empty());
        assert!(QueryParams::parse("?").is_empty());
    }

    #[test]
    fn set_replaces_first_and_drops_rest() {
        let mut p = QueryParams::parse("x=1&y=2&x=3");
        p.set("x", "9");
        assert_eq!(p.to_string(), "x=9&y=2");
        p.set("z", "a b");
        assert_eq!(p.to_string(), "x=9&y=2&z=a+b");
    }

    #[test]
    fn query_string_beats_attribute() {
        let attrs = ElementAttributes {
            selected_key: Some("a".into()),
            query_prefix: Some("kk".into()),
            ..Default::default()
        };
        let args = read_state_args("", "", "", Some(&attrs), false);
        assert_eq!(args.selected_key.as_deref(), Some("a"));
        let args = read_state_args("?kk-key=b", "", "", Some(&attrs), false);
        assert_eq!(args.selected_key.as_deref(), Some("b"));
    }

    #[test]
    fn explicit_defaults_reset_missing_fields() {
        let args = read_state_args("?kk-map=other", "kk", "", None, true);
        assert_eq!(
            args,
            StateIdArgs {
                keymap_id: Some("other".into()),
                selected_key: Some(String::new()),
                layer_idx: Some(0),
                guide_id: Some(None),
                guide_step_idx: Some(0),
                ..Default::default()
            }
        );
        let args = read_state_args("?kk-map=other", "kk", "", None, false);
        assert_eq!(args, StateIdArgs::new().keymap("other"));
    }

    #[test]
    fn explicit_defaults_restore_baseline_keymap() {
        let args = read_state_args("?theme=dark", "kk", "main", None, true);
        assert_eq!(args.keymap_id.as_deref(), Some("main"));
        let args = read_state_args("?theme=dark", "kk", "main", None, false);
        assert_eq!(args.keymap_id, None);
    }

    #[test]
    fn keymap_written_against_attribute_baseline() {
        let attrs = ElementAttributes {
            keymap_id: Some("alt".into()),
            ..Default::default()
        };
        assert_eq!(keymap_baseline(&attrs, "main"), "alt");
        assert_eq!(keymap_baseline(&ElementAttributes::default(), "main"), "main");

        // The default layout differs from the attribute, so it must be
        // written or a reload would show the attribute's layout.
        assert_eq!(
            write_query(&snapshot(), &attrs, "/p", "").as_deref(),
            Some("/p?kk-map=main")
        );
        let s = StateSnapshot {
            keymap_id: "alt".into(),
            ..snapshot()
        };
        assert_eq!(write_query(&s, &attrs, "/p", "?kk-map=alt").as_deref(), Some("/p"));
    }

    #[test]
    fn unparsable_integers_are_absent() {
        let args = read_state_args("?kk-layer=two&kk-step=x", "kk", "", None, false);
        assert_eq!(args.layer_idx, None);
        assert_eq!(args.guide_step_idx, None);
    }

    #[test]
    fn no_prefix_ignores_query() {
        assert!(read_state_args("?kk-key=b&debug=true", "", "", None, true).is_empty());
    }

    #[test]
    fn debug_flag() {
        assert_eq!(read_state_args("?debug=true", "kk", "", None, false).debug, Some(1));
        assert_eq!(read_state_args("?debug=no", "kk", "", None, false).debug, Some(0));
    }

    #[test]
    fn write_omits_defaults_and_preserves_others() {
        let mut s = snapshot();
        assert_eq!(write_query(&s, &ElementAttributes::default(), "/p", "?x=1"), None);

        s.selected_key = Some("k-1-1".into());
        s.layer_idx = 2;
        assert_eq!(
            write_query(&s, &ElementAttributes::default(), "/p", "?x=1").as_deref(),
            Some("/p?x=1&kk-layer=2&kk-key=k-1-1")
        );
    }

    #[test]
    fn write_omits_values_matching_attributes() {
        let attrs = ElementAttributes {
            keymap_id: Some("alt".into()),
            layer: Some("1".into()),
            selected_key: Some("k-1-1".into()),
            ..Default::default()
        };
        let s = StateSnapshot {
            keymap_id: "alt".into(),
            layer_idx: 1,
            selected_key: Some("k-1-1".into()),
            ..snapshot()
        };
        assert_eq!(write_query(&s, &attrs, "/p", "?kk-key=zzz").as_deref(), Some("/p"));
    }

    #[test]
    fn write_guide_and_step() {
        let s = StateSnapshot {
            guide_id: Some("tour".into()),
            guide_step_idx: Some(0),
            ..snapshot()
        };
        assert_eq!(
            write_query(&s, &ElementAttributes::default(), "/", "").as_deref(),
            Some("/?kk-guide=tour")
        );
        let s = StateSnapshot {
            guide_step_idx: Some(2),
            ..s
        };
        assert_eq!(
            write_query(&s, &ElementAttributes::default(), "/", "").as_deref(),
            Some("/?kk-guide=tour&kk-step=2")
        );
    }

    #[test]
    fn write_disabled_without_prefix() {
        let s = StateSnapshot {
            query_prefix: String::new(),
            selected_key: Some("k".into()),
            ..snapshot()
        };
        assert_eq!(write_query(&s, &ElementAttributes::default(), "/", ""), None);
    }

    #[test]
    fn strip_old_prefix() {
        assert_eq!(
            strip_prefixed("old", "/p", "?old-key=a&keep=1&old-layer=2"),
            "/p?keep=1"
        );
        assert_eq!(strip_prefixed("old", "/p", "?old-key=a"), "/p");
    }
}
