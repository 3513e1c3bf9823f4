//! Physical key placement in pixels.
//!
//! Models place keys on a 1-based grid (the first column is `x = 1`). A
//! placement maps that grid onto the page at a given origin and unit size,
//! and computes the handle each diagram line attaches to.

use kk_core::{KeyId, KeyboardModel};
use kurbo::{Point, Rect, Vec2};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementConfig {
    /// Pixels per grid unit, and the upper bound when fitting to a width.
    pub grid_unit: f64,
    /// Handle offset per grid column. Keeps lines to keys on the same row
    /// from landing on top of each other.
    pub handle_column_factor: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            grid_unit: 12.0,
            handle_column_factor: 1.0 / 3.0,
        }
    }
}

/// Vertical handle offset: up for keys whose handle sits in the top half,
/// down otherwise, growing with the column.
pub fn handle_y_offset(col_start: f64, handle_top: bool, factor: f64) -> f64 {
    let direction = if handle_top { -1.0 } else { 1.0 };
    col_start * factor * direction
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedKey {
    pub id: KeyId,
    pub rect: Rect,
    pub handle: Point,
    /// Alternates by model order: even keys get a top handle.
    pub handle_top: bool,
}

#[derive(Debug, Clone, Default)]
pub struct KeyboardPlacement {
    keys: Vec<PlacedKey>,
    index: HashMap<KeyId, usize>,
    bounds: Rect,
}

impl KeyboardPlacement {
    pub fn new(model: &KeyboardModel, origin: Point, unit: f64, config: &PlacementConfig) -> Self {
        let mut bounds: Option<Rect> = None;
        let mut keys = Vec::with_capacity(model.physical_keys().len());
        let mut index = HashMap::with_capacity(model.physical_keys().len());

        for (idx, pk) in model.physical_keys().iter().enumerate() {
            let x0 = origin.x + (pk.position.x - 1.0) * unit;
            let y0 = origin.y + (pk.position.y - 1.0) * unit;
            let rect = Rect::new(x0, y0, x0 + pk.size.width * unit, y0 + pk.size.height * unit);
            let handle_top = idx % 2 == 0;
            let handle = rect.center()
                + Vec2::new(
                    0.0,
                    handle_y_offset(pk.position.x, handle_top, config.handle_column_factor),
                );
            bounds = Some(bounds.map_or(rect, |b| b.union(rect)));
            index.insert(pk.id(), keys.len());
            keys.push(PlacedKey {
                id: pk.id(),
                rect,
                handle,
                handle_top,
            });
        }

        Self {
            keys,
            index,
            bounds: bounds.unwrap_or(Rect::from_origin_size(origin, (0.0, 0.0))),
        }
    }

    /// Largest unit (capped at `config.grid_unit`) that fits `width`.
    pub fn fit_width(model: &KeyboardModel, origin: Point, width: f64, config: &PlacementConfig) -> Self {
        let columns = model
            .physical_keys()
            .iter()
            .map(|k| k.position.x - 1.0 + k.size.width)
            .fold(0.0, f64::max);
        let unit = if columns > 0.0 && width > 0.0 {
            (width / columns).min(config.grid_unit)
        } else {
            config.grid_unit
        };
        Self::new(model, origin, unit, config)
    }

    /// Keys in paint order.
    pub fn keys(&self) -> &[PlacedKey] {
        &self.keys
    }

    pub fn get(&self, id: KeyId) -> Option<&PlacedKey> {
        self.index.get(&id).map(|&i| &self.keys[i])
    }

    pub fn key_rect(&self, id: KeyId) -> Option<Rect> {
        self.get(id).map(|k| k.rect)
    }

    pub fn handle_point(&self, id: KeyId) -> Option<Point> {
        self.get(id).map(|k| k.handle)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}
