//! The navbar: keymap selector, layer tabs, guide list, guide controls,
//! and the title-bar copy of the active key.
//!
//! Each control re-renders only when the state it shows changes:
//!
//! | control        | available items | selected item   |
//! |----------------|-----------------|-----------------|
//! | keymaps        | `keymaps`       | `keymap`        |
//! | layers         | `keymap`        | `layer`         |
//! | guides         | `keymap`        | `guide`, `step` |
//! | guide controls | `guide`         | `step`          |

use crate::error::UiResult;
use kk_core::{
    KeyId, KeymapUiState, Legend, ModelError, Size, StateChangeMap, StateField, StateIdArgs,
    StateObserver,
};
use serde::Serialize;

// ─── Rendered controls ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeymapOption {
    pub id: String,
    /// `"{layout} ({model})"`
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeymapSelector {
    pub options: Vec<KeymapOption>,
    pub disabled: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerTab {
    pub index: usize,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerTabs {
    pub label: String,
    pub tabs: Vec<LayerTab>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideButton {
    pub guide_id: String,
    pub label: String,
    /// The guide is running; the button exits it.
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideList {
    pub buttons: Vec<GuideButton>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideControls {
    pub hidden: bool,
    pub previous_disabled: bool,
    pub next_disabled: bool,
}

impl Default for GuideControls {
    fn default() -> Self {
        Self {
            hidden: true,
            previous_disabled: true,
            next_disabled: true,
        }
    }
}

/// The active key as drawn in the title bar, or a blank placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleKey {
    pub source: Option<KeyId>,
    pub text_legend: Option<String>,
    pub html_legend: Option<String>,
    pub image_path: Option<String>,
    pub unset: bool,
    pub size: Size,
    /// The title bar grid is sized to fit the largest key of the board.
    pub grid: Size,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavbarModel {
    pub keymap_selector: KeymapSelector,
    pub layer_tabs: LayerTabs,
    pub guide_list: GuideList,
    pub guide_controls: GuideControls,
    pub title_key: TitleKey,
}

/// How many times each control was rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavbarRenders {
    pub keymap_selector: usize,
    pub layer_tabs: usize,
    pub guide_list: usize,
    pub guide_controls: usize,
}

// ─── Actions ─────────────────────────────────────────────────────────────

/// A click or selection in the navbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavbarAction {
    ChooseKeymap(String),
    ChooseLayer(usize),
    StartGuide(String),
    ExitGuide,
    NextStep,
    PreviousStep,
}

impl NavbarAction {
    /// The state update this action asks for. `None` when the control is
    /// disabled in the current state.
    pub fn to_args(&self, state: &KeymapUiState) -> Option<StateIdArgs> {
        match self {
            NavbarAction::ChooseKeymap(id) => Some(StateIdArgs::new().keymap(id.as_str())),
            NavbarAction::ChooseLayer(idx) => Some(StateIdArgs::new().layer(*idx as i64).key("")),
            NavbarAction::StartGuide(id) => Some(StateIdArgs::new().guide(Some(id)).step(0)),
            NavbarAction::ExitGuide => state.guide().map(|_| StateIdArgs::new().guide(None)),
            NavbarAction::NextStep => state
                .guide_step()
                .and_then(|s| s.next_index())
                .map(|i| StateIdArgs::new().step(i as i64)),
            NavbarAction::PreviousStep => state
                .guide_step()
                .and_then(|s| s.previous_index())
                .map(|i| StateIdArgs::new().step(i as i64)),
        }
    }
}

// ─── View ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NavbarView {
    model: NavbarModel,
    renders: NavbarRenders,
}

impl NavbarView {
    pub fn new(state: &KeymapUiState) -> Self {
        let mut view = Self::default();
        view.render_keymap_selector(state);
        view.render_layer_tabs(state);
        view.render_guide_list(state);
        view.render_guide_controls(state);
        view
    }

    pub fn model(&self) -> &NavbarModel {
        &self.model
    }

    pub fn renders(&self) -> NavbarRenders {
        self.renders
    }

    /// Copy the active key (or a blank key) into the title bar.
    pub fn update_title_key(&mut self, state: &KeymapUiState, active: Option<KeyId>) -> UiResult<()> {
        let model = state.model();
        let title = match active {
            None => TitleKey {
                unset: true,
                size: model.default_blank_key_size,
                grid: model.max_key_size,
                ..TitleKey::default()
            },
            Some(id) => {
                let key = state.layer().get(id).ok_or_else(|| ModelError::PhysicalKeyNotFound {
                    id: id.to_string(),
                    board: model.element_name.clone(),
                })?;
                let physical = model.physical_key(id)?;
                let mut title = TitleKey {
                    source: Some(id),
                    unset: key.unset,
                    size: physical.size,
                    grid: model.max_key_size,
                    ..TitleKey::default()
                };
                match key.legend() {
                    Legend::Image(path) => title.image_path = Some(path.to_string()),
                    Legend::Html(html) => title.html_legend = Some(html.to_string()),
                    Legend::Text(text) => title.text_legend = Some(text.to_string()),
                }
                title
            }
        };
        self.model.title_key = title;
        Ok(())
    }

    fn render_keymap_selector(&mut self, state: &KeymapUiState) {
        let active = &state.keymap().unique_id;
        let options: Vec<KeymapOption> = state
            .keymaps()
            .iter()
            .map(|l| KeymapOption {
                id: l.unique_id.clone(),
                label: format!("{} ({})", l.display_name, l.model.display_name),
                selected: &l.unique_id == active,
            })
            .collect();
        let single = options.len() <= 1;
        self.model.keymap_selector = KeymapSelector {
            options,
            disabled: single,
            hidden: single,
        };
        self.renders.keymap_selector += 1;
    }

    fn render_layer_tabs(&mut self, state: &KeymapUiState) {
        let layers = &state.keymap().layers;
        let tabs = layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerTab {
                index,
                label: layer.short_name.clone(),
                active: index == state.layer_index(),
            })
            .collect();
        self.model.layer_tabs = LayerTabs {
            label: "Layers".into(),
            tabs,
            hidden: layers.len() <= 1,
        };
        self.renders.layer_tabs += 1;
    }

    /// Only the first guide of a layout gets a button.
    fn render_guide_list(&mut self, state: &KeymapUiState) {
        let guides = &state.keymap().guides;
        let running = state.guide().map(|g| g.id.as_str());
        let buttons = guides
            .first()
            .map(|guide| {
                let active = running == Some(guide.id.as_str());
                GuideButton {
                    guide_id: guide.id.clone(),
                    label: if active {
                        "Exit Guide".into()
                    } else {
                        format!("Start {}", guide.short_name)
                    },
                    active,
                }
            })
            .into_iter()
            .collect();
        self.model.guide_list = GuideList {
            buttons,
            hidden: guides.is_empty(),
        };
        self.renders.guide_list += 1;
    }

    fn render_guide_controls(&mut self, state: &KeymapUiState) {
        self.model.guide_controls = match state.guide_step() {
            Some(step) => GuideControls {
                hidden: false,
                previous_disabled: step.is_first_step(),
                next_disabled: step.is_last_step(),
            },
            None => GuideControls::default(),
        };
        self.renders.guide_controls += 1;
    }
}

impl StateObserver for NavbarView {
    fn observer_name(&self) -> &str {
        "NavbarView"
    }

    fn update(&mut self, state: &KeymapUiState, changes: &StateChangeMap) {
        use StateField::*;
        if changes.has_any(&[Keymaps, Keymap]) {
            self.render_keymap_selector(state);
        }
        if changes.has_any(&[Keymaps, Keymap, Guide, GuideStep]) {
            self.render_guide_list(state);
        }
        if changes.has_any(&[Keymap, Layer]) {
            self.render_layer_tabs(state);
        }
        if changes.has_any(&[Guide, GuideStep]) {
            self.render_guide_controls(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kk_core::{ChangeMetadata, load_layouts};
    use pretty_assertions::assert_eq;

    const BUNDLE: &str = include_str!("../../kk-core/tests/fixtures/demo_bundle.json");

    fn state() -> KeymapUiState {
        let mut state = KeymapUiState::new();
        state.set_models_and_maps(load_layouts(BUNDLE).unwrap()).unwrap();
        state
    }

    fn apply(view: &mut NavbarView, state: &mut KeymapUiState, args: StateIdArgs) {
        let changes = state.set_states_by_ids(args, ChangeMetadata::user()).unwrap();
        view.update(state, &changes);
    }

    #[test]
    fn selector_lists_layouts_with_model_names() {
        let view = NavbarView::new(&state());
        let selector = &view.model().keymap_selector;
        assert!(!selector.hidden);
        assert_eq!(selector.options[0].label, "Demo QWERTY (Demo Keyboard)");
        assert!(selector.options[0].selected);
        assert!(!selector.options[1].selected);
    }

    #[test]
    fn single_layout_hides_selector() {
        let view = NavbarView::new(&KeymapUiState::new());
        assert!(view.model().keymap_selector.disabled);
        assert!(view.model().keymap_selector.hidden);
        assert!(view.model().guide_list.hidden);
        assert!(view.model().layer_tabs.hidden);
    }

    #[test]
    fn guide_button_toggles_label() {
        let mut state = state();
        let mut view = NavbarView::new(&state);
        assert_eq!(view.model().guide_list.buttons[0].label, "Start Start");
        assert!(view.model().guide_controls.hidden);

        apply(&mut view, &mut state, StateIdArgs::new().guide(Some("start")).step(0));
        assert_eq!(view.model().guide_list.buttons[0].label, "Exit Guide");
        let controls = &view.model().guide_controls;
        assert!(!controls.hidden);
        assert!(controls.previous_disabled);
        assert!(!controls.next_disabled);
    }

    #[test]
    fn only_affected_controls_rerender() {
        let mut state = state();
        let mut view = NavbarView::new(&state);
        let before = view.renders();
        apply(&mut view, &mut state, StateIdArgs::new().key("d-3-1"));
        assert_eq!(view.renders(), before);

        apply(&mut view, &mut state, StateIdArgs::new().layer(1));
        let after = view.renders();
        assert_eq!(after.layer_tabs, before.layer_tabs + 1);
        assert_eq!(after.keymap_selector, before.keymap_selector);
        assert!(view.model().layer_tabs.tabs[1].active);
    }

    #[test]
    fn actions_respect_guide_bounds() {
        let mut state = state();
        assert_eq!(NavbarAction::NextStep.to_args(&state), None);
        assert_eq!(NavbarAction::ExitGuide.to_args(&state), None);
        state
            .set_states_by_ids(StateIdArgs::new().guide(Some("start")).step(2), ChangeMetadata::user())
            .unwrap();
        assert_eq!(NavbarAction::NextStep.to_args(&state), None);
        assert_eq!(
            NavbarAction::PreviousStep.to_args(&state),
            Some(StateIdArgs::new().step(1))
        );
        assert_eq!(
            NavbarAction::ChooseLayer(0).to_args(&state),
            Some(StateIdArgs::new().layer(0).key(""))
        );
    }

    #[test]
    fn title_key_copies_legend_and_size() {
        let state = state();
        let mut view = NavbarView::new(&state);
        view.update_title_key(&state, Some(KeyId::intern("d-1-3"))).unwrap();
        let title = &view.model().title_key;
        assert_eq!(title.text_legend.as_deref(), Some("Fn"));
        assert_eq!(title.size, Size::new(4.0, 2.0));

        view.update_title_key(&state, None).unwrap();
        assert!(view.model().title_key.unset);
        assert_eq!(view.model().title_key.source, None);
    }
}
