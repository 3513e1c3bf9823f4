pub mod connection;
pub mod error;
pub mod geometry;
pub mod id;
pub mod loader;
pub mod model;
pub mod query;
pub mod state;

pub use connection::{Anchor, ConnectionKind, ConnectionPair, derive_connections};
pub use error::{ModelError, ModelResult, StateError, StateResult};
pub use geometry::{Point, Size};
pub use id::KeyId;
pub use loader::{LayoutBundle, load_layouts};
pub use model::*;
pub use query::{ElementAttributes, NavigationMode, QueryParams, read_state_args, write_query};
pub use state::{
    ChangeMetadata, InfoContent, KeymapUiState, ObserverHandle, ObserverRegistry, StateChange,
    StateChangeMap, StateField, StateIdArgs, StateObserver, StateSnapshot, StateValue,
};
