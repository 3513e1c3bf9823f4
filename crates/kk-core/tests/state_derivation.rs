//! Integration tests: JSON bundle → state container → derived fields.

use kk_core::id::KeyId;
use kk_core::state::{ChangeMetadata, KeymapUiState, StateField, StateIdArgs};
use kk_core::{ConnectionKind, load_layouts};
use pretty_assertions::assert_eq;

fn demo_state() -> KeymapUiState {
    let layouts = load_layouts(include_str!("fixtures/demo_bundle.json")).unwrap();
    let mut state = KeymapUiState::new();
    state.set_models_and_maps(layouts).unwrap();
    state
}

fn apply(state: &mut KeymapUiState, args: StateIdArgs) {
    state
        .set_states_by_ids(args, ChangeMetadata::default())
        .unwrap();
}

// ─── Loading ─────────────────────────────────────────────────────────────

#[test]
fn bundle_layers_match_model_after_backfill() {
    let state = demo_state();
    let model = state.model();
    for layout in state.keymaps() {
        for layer in &layout.layers {
            let mut layer_ids: Vec<_> = layer.keys().map(|k| k.id.to_string()).collect();
            let mut model_ids: Vec<_> = model.physical_keys().iter().map(|k| k.id().to_string()).collect();
            layer_ids.sort();
            model_ids.sort();
            assert_eq!(layer_ids, model_ids, "layer {}", layer.short_name);
        }
    }
}

#[test]
fn first_layout_is_default() {
    let state = demo_state();
    assert_eq!(state.keymap().unique_id, "demo-qwerty");
    assert_eq!(state.default_keymap().unique_id, "demo-qwerty");
    assert_eq!(state.layer().short_name, "Base");
}

#[test]
fn reloading_keeps_active_layout_when_present() {
    let mut state = demo_state();
    apply(&mut state, StateIdArgs::new().keymap("demo-alt"));
    let layouts = load_layouts(include_str!("fixtures/demo_bundle.json")).unwrap();
    let changes = state.set_models_and_maps(layouts).unwrap();
    assert!(changes.has(StateField::Keymaps));
    assert_eq!(state.keymap().unique_id, "demo-alt");
}

// ─── Derivation ──────────────────────────────────────────────────────────

#[test]
fn welcome_indicators_become_text_refs() {
    let state = demo_state();
    let pairs = state.connection_pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].kind, ConnectionKind::TextRef);
}

#[test]
fn selected_key_with_indicator_draws_both_lines() {
    let mut state = demo_state();
    apply(&mut state, StateIdArgs::new().key("d-3-1"));
    let kinds: Vec<_> = state.connection_pairs().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![ConnectionKind::Selected, ConnectionKind::TextRef]);
}

#[test]
fn changing_layer_clears_selection() {
    let mut state = demo_state();
    apply(&mut state, StateIdArgs::new().key("d-5-1"));
    let changes = state
        .set_states_by_ids(StateIdArgs::new().layer(1), ChangeMetadata::user())
        .unwrap();
    assert_eq!(state.selected_key(), None);
    assert!(changes.has(StateField::SelectedKey));
    assert!(changes.get(StateField::Layer).unwrap().metadata.is_user_initiated);
}

#[test]
fn switching_layout_leaves_guide() {
    let mut state = demo_state();
    apply(&mut state, StateIdArgs::new().guide(Some("start")));
    assert!(state.guide().is_some());
    let changes = state
        .set_states_by_ids(StateIdArgs::new().keymap("demo-alt"), ChangeMetadata::default())
        .unwrap();
    assert!(state.guide().is_none());
    assert!(state.guide_step().is_none());
    assert!(changes.has(StateField::Guide));
    assert!(changes.has(StateField::GuideStep));
}

// ─── Guide walkthrough ───────────────────────────────────────────────────

#[test]
fn three_step_guide_navigation() {
    let mut state = demo_state();

    apply(&mut state, StateIdArgs::new().guide(Some("start")));
    let step = state.guide_step().unwrap();
    assert_eq!(step.index, 0);
    assert!(step.is_first_step());
    assert_eq!(state.active_key(), None);
    assert_eq!(state.info_content().paragraphs().len(), 1);

    let next = step.next_index().unwrap() as i64;
    apply(&mut state, StateIdArgs::new().step(next));
    let step = state.guide_step().unwrap();
    assert_eq!(step.index, 1);
    assert_eq!(state.active_key(), Some(KeyId::intern("d-3-1")));
    assert_eq!(state.layer_index(), 0);

    let next = step.next_index().unwrap() as i64;
    apply(&mut state, StateIdArgs::new().step(next));
    let step = state.guide_step().unwrap();
    assert!(step.is_last_step());
    assert!(step.next_index().is_none());
    assert_eq!(state.layer_index(), 1, "last step moves to the function layer");
    assert_eq!(state.layer().get(KeyId::intern("d-1-1")).unwrap().name, "F1");

    // Stepping past the end stays on the last step.
    let past_end = step.index as i64 + 1;
    let changes = state
        .set_states_by_ids(StateIdArgs::new().step(past_end), ChangeMetadata::user())
        .unwrap();
    assert!(changes.is_empty());
    let step = state.guide_step().unwrap();
    assert_eq!(step.index, 2);
    assert!(step.is_last_step());

    let prev = step.previous_index().unwrap() as i64;
    apply(&mut state, StateIdArgs::new().step(prev));
    assert_eq!(state.guide_step().unwrap().index, 1);

    apply(&mut state, StateIdArgs::new().guide(None));
    assert!(state.guide().is_none());
    assert_eq!(state.active_key(), None);
}

#[test]
fn repeated_update_is_silent() {
    let mut state = demo_state();
    let args = StateIdArgs::new().guide(Some("start")).step(1);
    assert!(!state.set_states_by_ids(args.clone(), ChangeMetadata::default()).unwrap().is_empty());
    assert!(state.set_states_by_ids(args, ChangeMetadata::default()).unwrap().is_empty());
}
