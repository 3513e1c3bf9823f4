//! Diagram line geometry.
//!
//! Turns resolved connections (two screen points and a kind) into stroked
//! paths on a canvas that sits over the whole keyboard UI:
//!
//! - `Selected` lines go up from the title-bar key, across, and down into
//!   the board key.
//! - `TextRef` lines leave an indicator in the prose, run out to one of the
//!   side margins, travel vertically there and then go in to the key. Lines
//!   sharing a margin are spread apart so they never overlap: each one takes
//!   the first free Y at or below its source and a margin X further inward
//!   than the line before it.
//!
//! Everything is computed in canvas-local coordinates; callers pass page
//! coordinates and the canvas rect.

use crate::surface::{DrawSurface, Stroke, StrokeRole};
use kk_core::ConnectionKind;
use kurbo::{BezPath, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Two Y values closer than this are the same horizontal line.
const SAME_LINE_EPSILON: f64 = 1e-6;

// ─── Configuration ───────────────────────────────────────────────────────

/// Spacing and stroke constants, all in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagramConfig {
    /// How far above the title key the horizontal run of a selected line sits.
    pub selected_rise: f64,
    pub selected_width: f64,
    pub textref_width: f64,
    /// Vertical step between stacked text-ref lines leaving the prose.
    pub source_y_inset_tick: f64,
    /// Horizontal step between stacked text-ref lines in a margin.
    pub margin_inset_tick: f64,
    /// More lines than this on one margin means routing has gone wrong.
    pub max_stacked_lines: usize,
    pub debug_inset: f64,
    pub debug_ruler_step: f64,
    pub debug_ruler_tick: f64,
    pub debug_width: f64,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            selected_rise: 45.0,
            selected_width: 2.0,
            textref_width: 1.0,
            source_y_inset_tick: 3.0,
            margin_inset_tick: 5.0,
            max_stacked_lines: 100,
            debug_inset: 5.0,
            debug_ruler_step: 100.0,
            debug_ruler_tick: 10.0,
            debug_width: 2.0,
        }
    }
}

// ─── Inputs & outputs ────────────────────────────────────────────────────

/// Page-space rectangles of the regions the diagram routes around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagramRects {
    pub canvas: Rect,
    /// The center panel: keyboard plus info panel.
    pub keyboard_and_panel: Rect,
    pub diamarg_left: Rect,
    pub diamarg_right: Rect,
    pub key_info: Rect,
}

impl DiagramRects {
    fn to_canvas_space(self) -> Self {
        let offset = self.canvas.origin().to_vec2();
        Self {
            canvas: self.canvas - offset,
            keyboard_and_panel: self.keyboard_and_panel - offset,
            diamarg_left: self.diamarg_left - offset,
            diamarg_right: self.diamarg_right - offset,
            key_info: self.key_info - offset,
        }
    }
}

/// A connection with both ends resolved to page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub source: Point,
    pub target: Point,
    pub kind: ConnectionKind,
}

impl Connection {
    fn translated(self, offset: Vec2) -> Self {
        Self {
            source: self.source - offset,
            target: self.target - offset,
            kind: self.kind,
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            self.kind, self.source.x, self.source.y, self.target.x, self.target.y
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarginSide {
    Left,
    Right,
}

impl fmt::Display for MarginSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarginSide::Left => "left",
            MarginSide::Right => "right",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagramError {
    #[error("Diagram routing loop detected on the {side} margin ({used} lines already stacked)")]
    LoopDetected { side: MarginSide, used: usize },
}

/// Everything to draw for one frame, in canvas-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramPlan {
    pub canvas_size: Size,
    pub strokes: Vec<Stroke>,
}

// ─── Routing ─────────────────────────────────────────────────────────────

/// Y values already taken in each margin during one plan.
#[derive(Debug, Default)]
struct MarginRouter {
    left: Vec<f64>,
    right: Vec<f64>,
}

impl MarginRouter {
    fn route_textref(
        &mut self,
        connection: &Connection,
        keyboard_center: f64,
        rects: &DiagramRects,
        config: &DiagramConfig,
    ) -> Result<BezPath, DiagramError> {
        let (source, target) = (connection.source, connection.target);
        let side = if keyboard_center < target.x {
            MarginSide::Right
        } else {
            MarginSide::Left
        };
        let used = match side {
            MarginSide::Left => &mut self.left,
            MarginSide::Right => &mut self.right,
        };
        if used.len() > config.max_stacked_lines {
            return Err(DiagramError::LoopDetected {
                side,
                used: used.len(),
            });
        }

        let mut inset_y = source.y;
        let mut attempts = 0;
        while used.iter().any(|y| (y - inset_y).abs() < SAME_LINE_EPSILON) {
            inset_y += config.source_y_inset_tick;
            attempts += 1;
            if attempts >= config.max_stacked_lines {
                return Err(DiagramError::LoopDetected {
                    side,
                    used: used.len(),
                });
            }
        }
        used.push(inset_y);

        let inset_x = used.len() as f64 * config.margin_inset_tick;
        let margin_x = match side {
            MarginSide::Right => rects.diamarg_right.x1 - inset_x,
            MarginSide::Left => rects.diamarg_left.x0 + inset_x,
        };
        log::trace!("textref on {side} margin: y {} -> {inset_y}, x {margin_x}", source.y);

        let mut path = BezPath::new();
        path.move_to(source);
        path.line_to((source.x, inset_y));
        path.line_to((margin_x, inset_y));
        path.line_to((margin_x, target.y));
        path.line_to(target);
        Ok(path)
    }
}

fn selected_path(connection: &Connection, config: &DiagramConfig) -> BezPath {
    let (source, target) = (connection.source, connection.target);
    let middle_y = source.y - config.selected_rise;
    let mut path = BezPath::new();
    path.move_to(source);
    path.line_to((source.x, middle_y));
    path.line_to((target.x, middle_y));
    path.line_to(target);
    path
}

fn trace_rect(rect: Rect) -> BezPath {
    let mut path = BezPath::new();
    path.move_to((rect.x0, rect.y0));
    path.line_to((rect.x0, rect.y1));
    path.line_to((rect.x1, rect.y1));
    path.line_to((rect.x1, rect.y0));
    path.line_to((rect.x0, rect.y0));
    path
}

/// Center ruler plus traces of the routing regions.
fn debug_strokes(rects: &DiagramRects, keyboard_center: f64, config: &DiagramConfig) -> Vec<Stroke> {
    let mut ruler = BezPath::new();
    ruler.move_to((keyboard_center, 0.0));
    let mut idx = 0.0;
    while idx <= rects.canvas.height() {
        ruler.line_to((keyboard_center + config.debug_ruler_tick, idx));
        ruler.move_to((keyboard_center, idx));
        ruler.line_to((keyboard_center, idx + config.debug_ruler_step));
        idx += config.debug_ruler_step;
    }

    // Negative inset shrinks in kurbo.
    let inner = |r: Rect| r.inset(-config.debug_inset);
    [
        (ruler, StrokeRole::DebugCenterLine),
        (trace_rect(inner(rects.keyboard_and_panel)), StrokeRole::DebugKeyboard),
        (trace_rect(inner(rects.diamarg_left)), StrokeRole::DebugLeft),
        (trace_rect(inner(rects.diamarg_right)), StrokeRole::DebugRight),
    ]
    .into_iter()
    .map(|(path, role)| Stroke {
        path,
        role,
        width: config.debug_width,
    })
    .collect()
}

/// Compute every stroke for the given connections.
///
/// Connections are routed in order, so earlier text-ref lines get the
/// outermost margin lanes.
pub fn plan_diagram(
    rects: &DiagramRects,
    connections: &[Connection],
    config: &DiagramConfig,
    debug: bool,
) -> Result<DiagramPlan, DiagramError> {
    let offset = rects.canvas.origin().to_vec2();
    let local = rects.to_canvas_space();
    let keyboard_center = local.keyboard_and_panel.center().x;

    let mut strokes = if debug {
        debug_strokes(&local, keyboard_center, config)
    } else {
        Vec::new()
    };

    let mut router = MarginRouter::default();
    for connection in connections {
        let connection = connection.translated(offset);
        if debug {
            log::debug!("diagram: drawing {connection}");
        }
        let stroke = match connection.kind {
            ConnectionKind::TextRef => Stroke {
                path: router.route_textref(&connection, keyboard_center, &local, config)?,
                role: StrokeRole::TextRef,
                width: config.textref_width,
            },
            ConnectionKind::Selected => Stroke {
                path: selected_path(&connection, config),
                role: StrokeRole::Selected,
                width: config.selected_width,
            },
        };
        strokes.push(stroke);
    }

    Ok(DiagramPlan {
        canvas_size: local.canvas.size(),
        strokes,
    })
}

/// Clear the whole canvas, then stroke the plan.
pub fn draw_diagram<S: DrawSurface + ?Sized>(surface: &mut S, plan: &DiagramPlan) {
    surface.clear(Rect::from_origin_size(Point::ZERO, plan.canvas_size));
    for stroke in &plan.strokes {
        surface.stroke(stroke);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;
    use pretty_assertions::assert_eq;

    fn rects() -> DiagramRects {
        DiagramRects {
            canvas: Rect::new(0.0, 100.0, 1000.0, 900.0),
            keyboard_and_panel: Rect::new(200.0, 100.0, 800.0, 900.0),
            diamarg_left: Rect::new(0.0, 100.0, 200.0, 900.0),
            diamarg_right: Rect::new(800.0, 100.0, 1000.0, 900.0),
            key_info: Rect::new(200.0, 500.0, 800.0, 900.0),
        }
    }

    fn points(path: &BezPath) -> Vec<(f64, f64)> {
        path.elements()
            .iter()
            .filter_map(|el| match el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => Some((p.x, p.y)),
                _ => None,
            })
            .collect()
    }

    fn textref(sx: f64, sy: f64, tx: f64, ty: f64) -> Connection {
        Connection {
            source: Point::new(sx, sy),
            target: Point::new(tx, ty),
            kind: ConnectionKind::TextRef,
        }
    }

    #[test]
    fn selected_line_has_three_segments() {
        let c = Connection {
            source: Point::new(300.0, 600.0),
            target: Point::new(450.0, 250.0),
            kind: ConnectionKind::Selected,
        };
        let plan = plan_diagram(&rects(), &[c], &DiagramConfig::default(), false).unwrap();
        assert_eq!(plan.strokes.len(), 1);
        assert_eq!(plan.strokes[0].width, 2.0);
        // Canvas starts at y=100, so everything moves up by 100.
        assert_eq!(
            points(&plan.strokes[0].path),
            vec![(300.0, 500.0), (300.0, 455.0), (450.0, 455.0), (450.0, 150.0)]
        );
    }

    #[test]
    fn textref_side_follows_target() {
        let config = DiagramConfig::default();
        let right = plan_diagram(&rects(), &[textref(300.0, 700.0, 600.0, 300.0)], &config, false).unwrap();
        let left = plan_diagram(&rects(), &[textref(300.0, 700.0, 400.0, 300.0)], &config, false).unwrap();
        assert_eq!(
            points(&right.strokes[0].path),
            vec![(300.0, 600.0), (300.0, 600.0), (995.0, 600.0), (995.0, 200.0), (600.0, 200.0)]
        );
        assert_eq!(points(&left.strokes[0].path)[2], (5.0, 600.0));
    }

    #[test]
    fn stacked_textrefs_do_not_overlap() {
        let config = DiagramConfig::default();
        let lines = [
            textref(300.0, 700.0, 600.0, 300.0),
            textref(310.0, 700.0, 650.0, 320.0),
            textref(320.0, 703.0, 700.0, 340.0),
            textref(330.0, 700.0, 300.0, 360.0),
        ];
        let plan = plan_diagram(&rects(), &lines, &config, false).unwrap();
        let runs: Vec<(f64, f64)> = plan
            .strokes
            .iter()
            .map(|s| {
                let pts = points(&s.path);
                (pts[1].1, pts[2].0)
            })
            .collect();
        assert_eq!(
            runs,
            vec![
                (600.0, 995.0),
                (603.0, 990.0),
                (606.0, 985.0),
                // The left margin has its own lanes.
                (600.0, 5.0),
            ]
        );
    }

    #[test]
    fn debug_adds_ruler_and_traces() {
        let plan = plan_diagram(&rects(), &[], &DiagramConfig::default(), true).unwrap();
        let roles: Vec<_> = plan.strokes.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![
                StrokeRole::DebugCenterLine,
                StrokeRole::DebugKeyboard,
                StrokeRole::DebugLeft,
                StrokeRole::DebugRight
            ]
        );
        assert_eq!(
            points(&plan.strokes[2].path),
            vec![(5.0, 5.0), (5.0, 795.0), (195.0, 795.0), (195.0, 5.0), (5.0, 5.0)]
        );
    }

    #[test]
    fn debug_does_not_change_routing() {
        let lines = [textref(300.0, 700.0, 600.0, 300.0), textref(300.0, 700.0, 610.0, 300.0)];
        let config = DiagramConfig::default();
        let plain = plan_diagram(&rects(), &lines, &config, false).unwrap();
        let debug = plan_diagram(&rects(), &lines, &config, true).unwrap();
        assert_eq!(&debug.strokes[4..], &plain.strokes[..]);
    }

    #[test]
    fn too_many_stacked_lines_is_a_loop() {
        let config = DiagramConfig {
            max_stacked_lines: 3,
            ..Default::default()
        };
        let lines: Vec<_> = (0..6).map(|_| textref(300.0, 700.0, 600.0, 300.0)).collect();
        let err = plan_diagram(&rects(), &lines, &config, false).unwrap_err();
        assert!(matches!(err, DiagramError::LoopDetected { side: MarginSide::Right, .. }));
    }

    #[test]
    fn draw_clears_then_strokes() {
        let mut surface = crate::surface::RecordingSurface::default();
        let plan = plan_diagram(&rects(), &[textref(300.0, 700.0, 600.0, 300.0)], &DiagramConfig::default(), false)
            .unwrap();
        draw_diagram(&mut surface, &plan);
        assert_eq!(
            surface.ops[0],
            crate::surface::SurfaceOp::Clear(Rect::new(0.0, 0.0, 1000.0, 800.0))
        );
        assert_eq!(surface.strokes().count(), 1);
    }
}
