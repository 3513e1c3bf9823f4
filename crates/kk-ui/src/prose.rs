//! Info panel prose: title, paragraphs, and legend attribution.

use crate::view::{ViewKind, ViewNode};
use kk_core::connection::indicator_ids;
use kk_core::{InfoContent, KeyId, KeymapUiState, StepContent};

/// What the info panel shows for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoProse {
    pub title_html: String,
    pub paragraphs: Vec<String>,
    pub attribution: Option<String>,
    pub active_key: Option<KeyId>,
    /// Keys highlighted as related to the active key or step.
    pub selection: Vec<KeyId>,
    /// Keys named by indicators in the paragraphs, in document order.
    pub indicator_targets: Vec<KeyId>,
}

impl InfoProse {
    pub fn from_state(state: &KeymapUiState) -> Self {
        let content = state.info_content();
        let paragraphs = content.paragraphs().to_vec();
        let (title_html, attribution) = match content {
            InfoContent::Key(key) => {
                let title = if key.displays_as_unset() {
                    format!("<span>Unset key</span> <span class=\"key-id\">id: {}</span>", key.id)
                } else {
                    format!(
                        "<span>The <kbd>{}</kbd> key</span> <span class=\"key-id\">id: {}</span>",
                        key.name, key.id
                    )
                };
                let attribution = key
                    .image_attribution
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .map(|a| format!("Legend attribution: {a}"));
                (title, attribution)
            }
            InfoContent::Step(step) => match &step.content {
                StepContent::Prose { title, .. } => (title.clone(), None),
                StepContent::Key(_) => (String::new(), None),
            },
            // Layer names are plain text.
            InfoContent::Welcome(layer) => (escape_text(&layer.display_name), None),
        };
        let indicator_targets = indicator_ids(&paragraphs)
            .iter()
            .filter_map(|id| KeyId::lookup(id))
            .collect();

        Self {
            title_html,
            attribution,
            active_key: content.active_key(),
            selection: content.selection().to_vec(),
            indicator_targets,
            paragraphs,
        }
    }

    /// Nodes for the info prose region, in display order.
    pub fn to_nodes(&self) -> Vec<ViewNode> {
        let mut nodes = Vec::with_capacity(self.paragraphs.len() + 2);
        nodes.push(ViewNode::new(ViewKind::ProseTitle).with_html(self.title_html.as_str()));
        nodes.extend(
            self.paragraphs
                .iter()
                .map(|p| ViewNode::new(ViewKind::ProseParagraph).with_html(p.as_str())),
        );
        if let Some(attribution) = &self.attribution {
            nodes.push(ViewNode::new(ViewKind::Attribution).with_html(attribution.as_str()));
        }
        nodes
    }

    pub fn is_indicated(&self, id: KeyId) -> bool {
        self.indicator_targets.contains(&id)
    }

    /// In the selection but not the active key itself.
    pub fn is_related(&self, id: KeyId) -> bool {
        Some(id) != self.active_key && self.selection.contains(&id)
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kk_core::{
        ChangeMetadata, KeyboardModel, KeymapKey, KeymapLayer, KeymapLayout, PhysicalKey, Point,
        Size, StateIdArgs,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn state() -> KeymapUiState {
        let model = Arc::new(
            KeyboardModel::new(
                "prose-board",
                "Prose",
                Size::new(2.0, 2.0),
                Size::new(2.0, 2.0),
                vec![
                    PhysicalKey::new("pr", Point::new(1.0, 1.0), Size::new(2.0, 2.0)),
                    PhysicalKey::new("pr", Point::new(3.0, 1.0), Size::new(2.0, 2.0)),
                ],
            )
            .unwrap(),
        );
        let layer = KeymapLayer::from_key_list(
            "Base <1>",
            "Base",
            vec!["Hi <keymap-indicator id=\"pr-3-1\"></keymap-indicator>".into()],
            vec![
                KeymapKey::new("pr-1-1", "Tab", vec!["Indents.".into()])
                    .with_selection(["pr-1-1", "pr-3-1"])
                    .with_image("tab.svg", Some("Noun Project".into())),
            ],
        )
        .unwrap();
        let layout = KeymapLayout::new("Prose", "prose", Arc::clone(&model), vec![layer], vec![]).unwrap();
        let mut state = KeymapUiState::new();
        state.set_models_and_maps(vec![layout]).unwrap();
        state
    }

    #[test]
    fn welcome_title_is_escaped_layer_name() {
        let prose = InfoProse::from_state(&state());
        assert_eq!(prose.title_html, "Base &lt;1&gt;");
        assert_eq!(prose.indicator_targets, vec![KeyId::intern("pr-3-1")]);
        assert_eq!(prose.to_nodes().len(), 2);
    }

    #[test]
    fn key_title_and_attribution() {
        let mut state = state();
        state
            .set_states_by_ids(StateIdArgs::new().key("pr-1-1"), ChangeMetadata::default())
            .unwrap();
        let prose = InfoProse::from_state(&state);
        assert_eq!(
            prose.title_html,
            "<span>The <kbd>Tab</kbd> key</span> <span class=\"key-id\">id: pr-1-1</span>"
        );
        assert_eq!(prose.attribution.as_deref(), Some("Legend attribution: Noun Project"));
        assert!(!prose.is_related(KeyId::intern("pr-1-1")));
        assert!(prose.is_related(KeyId::intern("pr-3-1")));
    }

    #[test]
    fn backfilled_key_is_unset() {
        let mut state = state();
        state
            .set_states_by_ids(StateIdArgs::new().key("pr-3-1"), ChangeMetadata::default())
            .unwrap();
        let prose = InfoProse::from_state(&state);
        assert!(prose.title_html.starts_with("<span>Unset key</span>"));
        assert_eq!(prose.attribution, None);
    }
}
