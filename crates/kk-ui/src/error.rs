//! Errors surfaced by the orchestrator.

use kk_core::{ModelError, StateError};
use kk_render::DiagramError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UiError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Diagram(#[from] DiagramError),

    /// The active model names a keyboard element the host never registered.
    #[error("Keyboard element {name} not found")]
    MissingElement { name: String },

    #[error("Unhandled attribute: {0}")]
    UnknownAttribute(String),
}

pub type UiResult<T> = Result<T, UiError>;
