//! What the user is currently looking at, as one value.

use kk_core::{KeyId, KeymapUiState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    NoSelection,
    KeySelected(KeyId),
    InGuideStepWithKey { guide: String, step: usize, key: KeyId },
    InGuideStepWithoutKey { guide: String, step: usize },
}

impl SelectionState {
    /// A running guide wins over a selected key.
    pub fn of(state: &KeymapUiState) -> Self {
        if let (Some(guide), Some(step)) = (state.guide(), state.guide_step()) {
            let guide = guide.id.clone();
            return match step.key_id() {
                Some(key) => SelectionState::InGuideStepWithKey {
                    guide,
                    step: step.index,
                    key,
                },
                None => SelectionState::InGuideStepWithoutKey {
                    guide,
                    step: step.index,
                },
            };
        }
        match state.selected_key() {
            Some(key) => SelectionState::KeySelected(key),
            None => SelectionState::NoSelection,
        }
    }

    pub fn in_guide(&self) -> bool {
        matches!(
            self,
            SelectionState::InGuideStepWithKey { .. } | SelectionState::InGuideStepWithoutKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kk_core::{ChangeMetadata, StateIdArgs, load_layouts};
    use pretty_assertions::assert_eq;

    #[test]
    fn follows_guide_and_key_selection() {
        let mut state = KeymapUiState::new();
        state
            .set_models_and_maps(
                load_layouts(include_str!("../../kk-core/tests/fixtures/demo_bundle.json")).unwrap(),
            )
            .unwrap();
        assert_eq!(SelectionState::of(&state), SelectionState::NoSelection);

        let mut go = |args: StateIdArgs| {
            state.set_states_by_ids(args, ChangeMetadata::user()).unwrap();
            SelectionState::of(&state)
        };
        assert_eq!(go(StateIdArgs::new().key("d-7-1")), SelectionState::KeySelected(KeyId::intern("d-7-1")));
        let step0 = go(StateIdArgs::new().guide(Some("start")).step(0));
        assert_eq!(
            step0,
            SelectionState::InGuideStepWithoutKey { guide: "start".into(), step: 0 }
        );
        assert!(step0.in_guide());
        assert_eq!(
            go(StateIdArgs::new().step(1)),
            SelectionState::InGuideStepWithKey {
                guide: "start".into(),
                step: 1,
                key: KeyId::intern("d-3-1"),
            }
        );
        assert_eq!(go(StateIdArgs::new().guide(None)).in_guide(), false);
    }
}
