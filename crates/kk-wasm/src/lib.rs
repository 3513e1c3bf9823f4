//! WASM bridge for KeymapKit: exposes the keymap UI controller to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. The host page owns the DOM;
//! it forwards attribute changes, clicks and `popstate` events here, measures
//! the regions after each layout, and renders the navbar from
//! [`KeymapCanvas::navbar_json`]. Diagram lines are drawn straight onto the
//! overlay canvas.

mod browser;
mod console;
mod render2d;

pub use browser::BrowserEnvironment;
pub use render2d::CanvasSurface;

use kk_core::ElementAttributes;
use kk_render::LineColors;
use kk_ui::{KeymapUi, UiConfig, UiGeometry};
use kurbo::{Point, Rect};
use log::LevelFilter;
use serde::Deserialize;
use std::fmt::Display;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

// ─── Host-facing configuration ───────────────────────────────────────────

/// Everything the constructor accepts, as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CanvasConfig {
    #[serde(flatten)]
    ui: UiConfig,
    colors: LineColors,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    log_level: Option<String>,
}

impl CanvasConfig {
    fn parse(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    fn level(&self) -> LevelFilter {
        self.log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(LevelFilter::Warn)
    }
}

/// A `DOMRect`-shaped rectangle.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RectJs {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl From<RectJs> for Rect {
    fn from(r: RectJs) -> Self {
        Rect::new(r.x, r.y, r.x + r.width, r.y + r.height)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PointJs {
    x: f64,
    y: f64,
}

impl From<PointJs> for Point {
    fn from(p: PointJs) -> Self {
        Point::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeometryJs {
    canvas_origin: PointJs,
    center_panel: RectJs,
    diamarg_left: RectJs,
    diamarg_right: RectJs,
    info_prose: RectJs,
    keyboard: RectJs,
    title_key: PointJs,
}

impl From<GeometryJs> for UiGeometry {
    fn from(g: GeometryJs) -> Self {
        UiGeometry {
            canvas_origin: g.canvas_origin.into(),
            center_panel: g.center_panel.into(),
            diamarg_left: g.diamarg_left.into(),
            diamarg_right: g.diamarg_right.into(),
            info_prose: g.info_prose.into(),
            keyboard: g.keyboard.into(),
            title_key: g.title_key.into(),
        }
    }
}

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

// ─── Controller ──────────────────────────────────────────────────────────

/// The WASM-facing keymap UI controller.
///
/// One instance per UI root. Every mutating call returns an `Error` to JS
/// when the underlying operation is rejected; the state is left untouched in
/// that case.
#[wasm_bindgen]
pub struct KeymapCanvas {
    ui: KeymapUi<BrowserEnvironment>,
}

#[wasm_bindgen]
impl KeymapCanvas {
    /// Create a controller drawing onto `ctx`. `config_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(ctx: CanvasRenderingContext2d, config_json: &str) -> Result<KeymapCanvas, JsValue> {
        console::init_panic_hook();
        let config = CanvasConfig::parse(config_json).map_err(js_error)?;
        console::init_logging(config.level());

        let surface = CanvasSurface::new(ctx, config.colors.clone());
        let ui = KeymapUi::new(BrowserEnvironment::new(), Box::new(surface), config.ui);
        Ok(Self { ui })
    }

    /// Tell the controller that a custom keyboard element is defined.
    pub fn register_element(&mut self, name: &str) {
        self.ui.env_mut().register_element(name);
    }

    pub fn load_bundle(&mut self, json: &str) -> Result<(), JsValue> {
        self.ui.load_bundle(json).map_err(js_error)
    }

    /// Attach to the page. `attributes_json` holds the root's attributes by
    /// their kebab-case names.
    pub fn connect(&mut self, attributes_json: &str) -> Result<(), JsValue> {
        let attributes: ElementAttributes = if attributes_json.trim().is_empty() {
            ElementAttributes::default()
        } else {
            serde_json::from_str(attributes_json).map_err(js_error)?
        };
        self.ui.connect(attributes).map_err(js_error)
    }

    pub fn disconnect(&mut self) {
        self.ui.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.ui.is_connected()
    }

    /// `attributeChangedCallback`. A `null` value removes the attribute.
    pub fn set_attribute(&mut self, name: &str, value: Option<String>) -> Result<(), JsValue> {
        self.ui.set_attribute(name, value.as_deref()).map_err(js_error)
    }

    pub fn handle_pop_state(&mut self) -> Result<(), JsValue> {
        self.ui.handle_pop_state().map_err(js_error)
    }

    pub fn handle_key_selected(&mut self, key_id: &str) -> Result<(), JsValue> {
        self.ui.handle_key_selected(key_id).map_err(js_error)
    }

    /// Select the key under a page-space point. Returns its id, if any.
    pub fn handle_click(&mut self, x: f64, y: f64) -> Result<Option<String>, JsValue> {
        let Some(key) = self.ui.key_at(Point::new(x, y)) else {
            return Ok(None);
        };
        self.ui.handle_key_selected(key.as_str()).map_err(js_error)?;
        Ok(Some(key.as_str().to_string()))
    }

    // ─── Navbar ──────────────────────────────────────────────────────────

    pub fn choose_keymap(&mut self, id: &str) -> Result<(), JsValue> {
        self.ui.choose_keymap(id).map_err(js_error)
    }

    pub fn choose_layer(&mut self, index: usize) -> Result<(), JsValue> {
        self.ui.choose_layer(index).map_err(js_error)
    }

    pub fn start_guide(&mut self) -> Result<(), JsValue> {
        self.ui.start_guide().map_err(js_error)
    }

    pub fn exit_guide(&mut self) -> Result<(), JsValue> {
        self.ui.exit_guide().map_err(js_error)
    }

    pub fn next_step(&mut self) -> Result<(), JsValue> {
        self.ui.next_step().map_err(js_error)
    }

    pub fn previous_step(&mut self) -> Result<(), JsValue> {
        self.ui.previous_step().map_err(js_error)
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// The canvas was resized to `width` x `height` CSS pixels.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), JsValue> {
        self.ui.resize(width, height).map_err(js_error)
    }

    /// Region rectangles measured after layout, as `DOMRect`-shaped objects.
    pub fn set_geometry(&mut self, geometry_json: &str) -> Result<(), JsValue> {
        let geometry: GeometryJs = serde_json::from_str(geometry_json).map_err(js_error)?;
        self.ui.set_geometry(geometry.into()).map_err(js_error)
    }

    /// Centers of the prose indicators in document order, as `[{x, y}]`.
    pub fn set_indicator_anchors(&mut self, points_json: &str) -> Result<(), JsValue> {
        let points: Vec<PointJs> = serde_json::from_str(points_json).map_err(js_error)?;
        self.ui
            .set_indicator_anchors(points.into_iter().map(Point::from).collect())
            .map_err(js_error)
    }

    pub fn redraw(&mut self) -> Result<(), JsValue> {
        self.ui.redraw_diagram().map_err(js_error)
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn navbar_json(&self) -> String {
        serde_json::to_string(self.ui.navbar().model()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn state_json(&self) -> String {
        serde_json::to_string(&self.ui.state().snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// The view tree as indented text, for debugging.
    pub fn outline(&self) -> String {
        self.ui.tree().outline()
    }

    pub fn key_attribute(&self, key_id: &str, name: &str) -> Option<String> {
        self.ui.key_attribute(key_id, name).map(str::to_string)
    }

    pub fn prose_title_html(&self) -> String {
        self.ui.prose().title_html.clone()
    }

    pub fn prose_paragraphs(&self) -> Vec<String> {
        self.ui.prose().paragraphs.clone()
    }
}

// ─── Standalone validation (no canvas needed) ────────────────────────────

/// Validate a layout bundle. Returns `{"ok":true,"layouts":n}` or
/// `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate_bundle(json: &str) -> String {
    let result = match kk_core::load_layouts(json) {
        Ok(layouts) => serde_json::json!({ "ok": true, "layouts": layouts.len() }),
        Err(err) => serde_json::json!({ "ok": false, "error": err.to_string() }),
    };
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BUNDLE: &str = include_str!("../../kk-core/tests/fixtures/demo_bundle.json");

    #[test]
    fn empty_config_is_default() {
        let config = CanvasConfig::parse("  ").unwrap();
        assert_eq!(config, CanvasConfig::default());
        assert_eq!(config.level(), LevelFilter::Warn);
    }

    #[test]
    fn config_reads_nested_tunables() {
        let config = CanvasConfig::parse(
            r##"{"diagram":{"selectedRise":30},"colors":{"selected":"red"},"logLevel":"debug"}"##,
        )
        .unwrap();
        assert_eq!(config.ui.diagram.selected_rise, 30.0);
        assert_eq!(config.ui.diagram.textref_width, 1.0);
        assert_eq!(config.colors.selected, "red");
        assert_eq!(config.colors.textref, LineColors::default().textref);
        assert_eq!(config.level(), LevelFilter::Debug);
    }

    #[test]
    fn geometry_converts_dom_rects() {
        let rect = r#"{"x":10,"y":20,"width":100,"height":50}"#;
        let point = r#"{"x":1,"y":2}"#;
        let json = format!(
            r#"{{"canvasOrigin":{point},"centerPanel":{rect},"diamargLeft":{rect},
                "diamargRight":{rect},"infoProse":{rect},"keyboard":{rect},"titleKey":{point}}}"#
        );
        let geometry: UiGeometry = serde_json::from_str::<GeometryJs>(&json).unwrap().into();
        assert_eq!(geometry.keyboard, Rect::new(10.0, 20.0, 110.0, 70.0));
        assert_eq!(geometry.title_key, Point::new(1.0, 2.0));
    }

    #[test]
    fn validates_bundles() {
        let ok: serde_json::Value = serde_json::from_str(&validate_bundle(BUNDLE)).unwrap();
        assert_eq!(ok["ok"], true);
        assert!(ok["layouts"].as_u64().unwrap() > 0);

        let bad: serde_json::Value = serde_json::from_str(&validate_bundle("{")).unwrap();
        assert_eq!(bad["ok"], false);
        assert!(bad["error"].is_string());
    }
}
