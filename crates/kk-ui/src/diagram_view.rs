//! The diagram observer: resolves connection anchors to page positions and
//! redraws the canvas when the connections or the debug level change.

use kk_core::{Anchor, KeymapUiState, StateChangeMap, StateField, StateObserver};
use kk_render::{
    Connection, DiagramConfig, DiagramError, DiagramPlan, DiagramRects, DrawSurface,
    KeyboardPlacement, PlacementConfig, draw_diagram, plan_diagram,
};
use kurbo::{Point, Rect, Size};
use serde::Deserialize;

/// Tunables for one UI root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    pub diagram: DiagramConfig,
    pub placement: PlacementConfig,
}

/// Page-space positions of the regions, measured by the host after layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiGeometry {
    pub canvas_origin: Point,
    pub center_panel: Rect,
    pub diamarg_left: Rect,
    pub diamarg_right: Rect,
    pub info_prose: Rect,
    pub keyboard: Rect,
    /// Handle of the key shown in the navbar title bar.
    pub title_key: Point,
}

/// Turns abstract anchors into page positions.
pub struct AnchorMap<'a> {
    pub placement: &'a KeyboardPlacement,
    pub title_key: Point,
    /// Indicator positions in document order.
    pub indicators: &'a [Point],
}

impl AnchorMap<'_> {
    pub fn resolve(&self, anchor: Anchor) -> Option<Point> {
        match anchor {
            Anchor::TitleKey => Some(self.title_key),
            Anchor::KeyHandle { key } => self.placement.handle_point(key),
            Anchor::Indicator { index, .. } => self.indicators.get(index).copied(),
        }
    }
}

pub struct DiagramView {
    surface: Box<dyn DrawSurface>,
    config: UiConfig,
    geometry: Option<UiGeometry>,
    canvas_size: Size,
    indicators: Vec<Point>,
    placement: KeyboardPlacement,
    plan: Option<DiagramPlan>,
    fault: Option<DiagramError>,
    draws: usize,
}

impl std::fmt::Debug for DiagramView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramView")
            .field("canvas_size", &self.canvas_size)
            .field("draws", &self.draws)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

impl DiagramView {
    pub fn new(surface: Box<dyn DrawSurface>, config: UiConfig) -> Self {
        Self {
            surface,
            config,
            geometry: None,
            canvas_size: Size::ZERO,
            indicators: Vec::new(),
            placement: KeyboardPlacement::default(),
            plan: None,
            fault: None,
            draws: 0,
        }
    }

    pub fn placement(&self) -> &KeyboardPlacement {
        &self.placement
    }

    pub fn plan(&self) -> Option<&DiagramPlan> {
        self.plan.as_ref()
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    /// The last routing failure, cleared by the next successful draw.
    pub fn take_fault(&mut self) -> Option<DiagramError> {
        self.fault.take()
    }

    pub fn set_geometry(&mut self, geometry: UiGeometry) {
        self.geometry = Some(geometry);
    }

    pub fn set_indicator_anchors(&mut self, indicators: Vec<Point>) {
        self.indicators = indicators;
    }

    pub fn set_canvas_size(&mut self, size: Size) {
        self.canvas_size = size;
    }

    fn ready(&self) -> bool {
        self.geometry.is_some() && self.canvas_size.width > 0.0 && self.canvas_size.height > 0.0
    }

    pub fn refresh_placement(&mut self, state: &KeymapUiState) {
        let Some(geometry) = self.geometry else { return };
        self.placement = KeyboardPlacement::fit_width(
            state.model(),
            geometry.keyboard.origin(),
            geometry.keyboard.width(),
            &self.config.placement,
        );
    }

    /// Re-plan and redraw every line. Skipped until the state is
    /// initialized and the host has measured the layout.
    pub fn redraw(&mut self, state: &KeymapUiState) {
        if !state.initialized() || !self.ready() {
            log::trace!("diagram: not ready, skipping redraw");
            return;
        }
        let Some(geometry) = self.geometry else { return };
        self.refresh_placement(state);

        let anchors = AnchorMap {
            placement: &self.placement,
            title_key: geometry.title_key,
            indicators: &self.indicators,
        };
        let connections: Vec<Connection> = state
            .connection_pairs()
            .iter()
            .filter_map(|pair| match (anchors.resolve(pair.source), anchors.resolve(pair.target)) {
                (Some(source), Some(target)) => Some(Connection {
                    source,
                    target,
                    kind: pair.kind,
                }),
                _ => {
                    log::warn!("diagram: unresolved anchor in {pair}");
                    None
                }
            })
            .collect();

        let rects = DiagramRects {
            canvas: Rect::from_origin_size(geometry.canvas_origin, self.canvas_size),
            keyboard_and_panel: geometry.center_panel,
            diamarg_left: geometry.diamarg_left,
            diamarg_right: geometry.diamarg_right,
            key_info: geometry.info_prose,
        };
        match plan_diagram(&rects, &connections, &self.config.diagram, state.debug() > 0) {
            Ok(plan) => {
                draw_diagram(self.surface.as_mut(), &plan);
                self.plan = Some(plan);
                self.fault = None;
                self.draws += 1;
            }
            Err(err) => {
                log::error!("diagram: {err}");
                self.fault = Some(err);
            }
        }
    }
}

impl StateObserver for DiagramView {
    fn observer_name(&self) -> &str {
        "DiagramView"
    }

    fn update(&mut self, state: &KeymapUiState, changes: &StateChangeMap) {
        if changes.has(StateField::Keymap) {
            self.refresh_placement(state);
        }
        if changes.has(StateField::ConnectionPairs) {
            // Measured positions belong to the prose they were taken from.
            self.indicators.clear();
        }
        if changes.has_any(&[StateField::ConnectionPairs, StateField::Debug]) {
            self.redraw(state);
        }
    }
}
