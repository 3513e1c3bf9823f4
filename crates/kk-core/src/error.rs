//! Error types for the layout model and the state container.

use thiserror::Error;

/// Construction-time validation failures. These are fatal: a layout that
/// fails here must be fixed by its author, never patched up at render time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Duplicate physical key IDs on board '{board}': {}", ids.join(", "))]
    DuplicatePhysicalKeys { board: String, ids: Vec<String> },

    #[error("Duplicate key IDs in key map: {}", ids.join(", "))]
    DuplicateKeys { ids: Vec<String> },

    #[error("Invalid key IDs in key map {layout} on layer {layer}: {}", ids.join(", "))]
    InvalidKeys {
        layout: String,
        layer: usize,
        ids: Vec<String>,
    },

    #[error("Physical key not found with id '{id}' on board '{board}'")]
    PhysicalKeyNotFound { id: String, board: String },

    #[error("Guide '{guide}' step {step}: cannot pass a key ID together with title or text")]
    StepKeyAndText { guide: String, step: usize },

    #[error("Guide '{guide}' step {step}: missing key ID, or title and text")]
    StepMissingContent { guide: String, step: usize },

    #[error("Guide '{guide}' has no steps")]
    EmptyGuide { guide: String },

    #[error("Guide '{guide}' in key map {layout}: invalid key IDs {}", ids.join(", "))]
    InvalidGuideKeys {
        layout: String,
        guide: String,
        ids: Vec<String>,
    },

    #[error("Guide '{guide}' step {step} targets layer {layer}, but key map {layout} has {count} layers")]
    GuideLayerOutOfRange {
        layout: String,
        guide: String,
        step: usize,
        layer: usize,
        count: usize,
    },

    #[error("Key map {layout} has no layers")]
    NoLayers { layout: String },

    #[error("Duplicate guide IDs in key map {layout}: {}", ids.join(", "))]
    DuplicateGuides { layout: String, ids: Vec<String> },

    #[error("Duplicate key map unique IDs: {}", ids.join(", "))]
    DuplicateLayouts { ids: Vec<String> },

    #[error("Layout '{layout}' references unknown keyboard model '{model}'")]
    UnknownModel { layout: String, model: String },

    #[error("Layout bundle JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Json(err.to_string())
    }
}

/// Lookup failures raised by `KeymapUiState::set_states_by_ids`. The state
/// is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No key map registered with unique ID '{0}'")]
    UnknownLayout(String),

    #[error("Key map '{layout}' has no layer {index} (it has {count})")]
    UnknownLayer {
        layout: String,
        index: i64,
        count: usize,
    },

    #[error("Key '{key}' not found in key map '{layout}'")]
    UnknownKey { layout: String, key: String },

    #[error("Guide '{guide}' not found in key map '{layout}'")]
    UnknownGuide { layout: String, guide: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type ModelResult<T> = Result<T, ModelError>;
pub type StateResult<T> = Result<T, StateError>;
