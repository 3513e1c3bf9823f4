//! The drawing seam between the diagram engine and a real canvas.
//!
//! The engine only ever clears and strokes paths. `kk-wasm` implements
//! [`DrawSurface`] over a Canvas2D context; tests use [`RecordingSurface`].

use kurbo::{BezPath, Rect};
use serde::Deserialize;
use std::cell::RefCell;
use std::rc::Rc;

/// What a stroke represents. Surfaces map roles to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeRole {
    Selected,
    TextRef,
    DebugCenterLine,
    DebugKeyboard,
    DebugLeft,
    DebugRight,
}

/// One stroked path.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub path: BezPath,
    pub role: StrokeRole,
    pub width: f64,
}

pub trait DrawSurface {
    fn clear(&mut self, rect: Rect);
    fn stroke(&mut self, stroke: &Stroke);
}

/// Line colors per role, as CSS color strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineColors {
    pub selected: String,
    pub textref: String,
    pub debug_center_line: String,
    pub debug_keyboard: String,
    pub debug_left: String,
    pub debug_right: String,
}

impl Default for LineColors {
    fn default() -> Self {
        Self {
            selected: "#d81b60".into(),
            textref: "#1e88e5".into(),
            debug_center_line: "#ff00ff".into(),
            debug_keyboard: "#00c853".into(),
            debug_left: "#ff6d00".into(),
            debug_right: "#6200ea".into(),
        }
    }
}

impl LineColors {
    pub fn for_role(&self, role: StrokeRole) -> &str {
        match role {
            StrokeRole::Selected => &self.selected,
            StrokeRole::TextRef => &self.textref,
            StrokeRole::DebugCenterLine => &self.debug_center_line,
            StrokeRole::DebugKeyboard => &self.debug_keyboard,
            StrokeRole::DebugLeft => &self.debug_left,
            StrokeRole::DebugRight => &self.debug_right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Clear(Rect),
    Stroke(Stroke),
}

/// Records every call, for headless tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.ops.iter().filter_map(|op| match op {
            SurfaceOp::Stroke(s) => Some(s),
            SurfaceOp::Clear(_) => None,
        })
    }
}

impl DrawSurface for RecordingSurface {
    fn clear(&mut self, rect: Rect) {
        self.ops.push(SurfaceOp::Clear(rect));
    }

    fn stroke(&mut self, stroke: &Stroke) {
        self.ops.push(SurfaceOp::Stroke(stroke.clone()));
    }
}

/// Lets a host keep a handle on a surface it hands to a view.
impl<S: DrawSurface> DrawSurface for Rc<RefCell<S>> {
    fn clear(&mut self, rect: Rect) {
        self.borrow_mut().clear(rect);
    }

    fn stroke(&mut self, stroke: &Stroke) {
        self.borrow_mut().stroke(stroke);
    }
}
