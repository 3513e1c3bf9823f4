//! Grid-unit geometry for physical key placement.
//!
//! Keyboard models describe keys on an abstract grid (one unit is a quarter
//! or half of a 1u key depending on the board). Pixel geometry lives in
//! `kk-render`; these types never carry screen coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position on the keyboard grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A key or board extent on the keyboard grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Format a grid coordinate the way key IDs spell it: `3` rather than `3.0`.
pub fn format_grid(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_grid(self.x), format_grid(self.y))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_grid(self.width), format_grid(self.height))
    }
}
