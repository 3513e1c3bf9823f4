//! Integration tests: query string ⇄ state container.

use kk_core::query::{ElementAttributes, NavigationMode, read_state_args, write_query};
use kk_core::state::{ChangeMetadata, KeymapUiState, StateIdArgs};
use kk_core::load_layouts;
use pretty_assertions::assert_eq;

fn demo_state(prefix: &str) -> KeymapUiState {
    let layouts = load_layouts(include_str!("fixtures/demo_bundle.json")).unwrap();
    let mut state = KeymapUiState::new();
    state.set_models_and_maps(layouts).unwrap();
    state
        .set_states_by_ids(StateIdArgs::new().query_prefix(prefix), ChangeMetadata::default())
        .unwrap();
    state
}

#[test]
fn attribute_then_query_precedence_on_connect() {
    let attrs = ElementAttributes {
        selected_key: Some("d-3-1".into()),
        query_prefix: Some("kk".into()),
        ..Default::default()
    };

    let mut state = KeymapUiState::new();
    state
        .set_models_and_maps(load_layouts(include_str!("fixtures/demo_bundle.json")).unwrap())
        .unwrap();
    let args = read_state_args("", state.query_prefix(), "", Some(&attrs), false);
    state.set_states_by_ids(args, ChangeMetadata::default()).unwrap();
    assert_eq!(state.selected_key().map(|k| k.to_string()).as_deref(), Some("d-3-1"));

    let args = read_state_args("?kk-key=d-5-1", state.query_prefix(), "", Some(&attrs), false);
    state.set_states_by_ids(args, ChangeMetadata::default()).unwrap();
    assert_eq!(state.selected_key().map(|k| k.to_string()).as_deref(), Some("d-5-1"));
}

#[test]
fn state_round_trips_through_url() {
    let mut state = demo_state("kk");
    state
        .set_states_by_ids(
            StateIdArgs::new().keymap("demo-qwerty").guide(Some("start")).step(2),
            ChangeMetadata::user(),
        )
        .unwrap();

    let attrs = ElementAttributes::default();
    let url = write_query(&state.snapshot(), &attrs, "/docs", "?theme=dark").unwrap();
    assert_eq!(url, "/docs?theme=dark&kk-layer=1&kk-guide=start&kk-step=2");

    let search = &url["/docs".len()..];
    let mut restored = demo_state("kk");
    let args = read_state_args(search, restored.query_prefix(), "demo-qwerty", None, true);
    restored
        .set_states_by_ids(args, ChangeMetadata::default())
        .unwrap();
    assert_eq!(restored.snapshot(), state.snapshot());
}

#[test]
fn back_navigation_restores_no_selection() {
    let mut state = demo_state("kk");
    state
        .set_states_by_ids(StateIdArgs::new().key("d-1-1"), ChangeMetadata::user())
        .unwrap();
    assert!(state.selected_key().is_some());

    // The previous history entry had no key parameter.
    let args = read_state_args("?theme=dark", state.query_prefix(), "demo-qwerty", None, true);
    let changes = state
        .set_states_by_ids(args, ChangeMetadata::default())
        .unwrap();
    assert_eq!(state.selected_key(), None);
    assert_eq!(NavigationMode::for_changes(&changes), Some(NavigationMode::Replace));
}

#[test]
fn out_of_range_step_in_url_is_clamped() {
    let mut state = demo_state("kk");
    let args = read_state_args("?kk-guide=start&kk-step=99", "kk", "", None, false);
    state.set_states_by_ids(args, ChangeMetadata::default()).unwrap();
    assert_eq!(state.guide_step().map(|s| s.index), Some(2));

    let args = read_state_args("?kk-guide=start&kk-step=-5", "kk", "demo-qwerty", None, true);
    state.set_states_by_ids(args, ChangeMetadata::default()).unwrap();
    assert_eq!(state.guide_step().map(|s| s.index), Some(0));
}

#[test]
fn user_clicks_push_history() {
    let mut state = demo_state("kk");
    let changes = state
        .set_states_by_ids(StateIdArgs::new().key("d-7-1"), ChangeMetadata::user())
        .unwrap();
    assert_eq!(NavigationMode::for_changes(&changes), Some(NavigationMode::Push));

    let changes = state
        .set_states_by_ids(StateIdArgs::new().debug(2), ChangeMetadata::user())
        .unwrap();
    assert_eq!(NavigationMode::for_changes(&changes), None);
}
