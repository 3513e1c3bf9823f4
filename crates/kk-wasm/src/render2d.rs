//! Canvas2D drawing surface.
//!
//! Strokes diagram paths onto the overlay `<canvas>` that sits above the
//! keyboard UI. Canvas coordinates are CSS pixels; the host is responsible
//! for the device-pixel-ratio transform.

use kk_render::{DrawSurface, LineColors, Stroke};
use kurbo::{BezPath, PathEl, Rect};
use web_sys::CanvasRenderingContext2d;

pub struct CanvasSurface {
    ctx: CanvasRenderingContext2d,
    colors: LineColors,
}

impl CanvasSurface {
    pub fn new(ctx: CanvasRenderingContext2d, colors: LineColors) -> Self {
        Self { ctx, colors }
    }

    pub fn set_colors(&mut self, colors: LineColors) {
        self.colors = colors;
    }
}

impl DrawSurface for CanvasSurface {
    fn clear(&mut self, rect: Rect) {
        self.ctx.clear_rect(rect.x0, rect.y0, rect.width(), rect.height());
    }

    fn stroke(&mut self, stroke: &Stroke) {
        self.ctx.save();
        self.ctx.set_stroke_style_str(self.colors.for_role(stroke.role));
        self.ctx.set_line_width(stroke.width);
        trace_path(&self.ctx, &stroke.path);
        self.ctx.stroke();
        self.ctx.restore();
    }
}

fn trace_path(ctx: &CanvasRenderingContext2d, path: &BezPath) {
    ctx.begin_path();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => ctx.move_to(p.x, p.y),
            PathEl::LineTo(p) => ctx.line_to(p.x, p.y),
            PathEl::QuadTo(c, p) => ctx.quadratic_curve_to(c.x, c.y, p.x, p.y),
            PathEl::CurveTo(c1, c2, p) => ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
            PathEl::ClosePath => ctx.close_path(),
        }
    }
}
