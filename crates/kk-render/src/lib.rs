pub mod diagram;
pub mod hit;
pub mod placement;
pub mod surface;

pub use diagram::{
    Connection, DiagramConfig, DiagramError, DiagramPlan, DiagramRects, MarginSide, draw_diagram,
    plan_diagram,
};
pub use hit::hit_test_key;
pub use placement::{KeyboardPlacement, PlacedKey, PlacementConfig};
pub use surface::{DrawSurface, LineColors, RecordingSurface, Stroke, StrokeRole, SurfaceOp};
