pub mod diagram_view;
pub mod env;
pub mod error;
pub mod navbar;
pub mod orchestrator;
pub mod prose;
pub mod selection;
pub mod view;

pub use diagram_view::{AnchorMap, DiagramView, UiConfig, UiGeometry};
pub use env::{Environment, HistoryOp, MemoryEnvironment};
pub use error::{UiError, UiResult};
pub use navbar::{NavbarAction, NavbarModel, NavbarView};
pub use orchestrator::KeymapUi;
pub use prose::InfoProse;
pub use selection::SelectionState;
pub use view::{Region, ViewKind, ViewNode, ViewTree};
