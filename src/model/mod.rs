//! In-memory layout model.
//!
//! Plain values owned by the root [`WindowManagerConfig`]. Component
//! references hold identity keys only, never instances.

mod group;
mod manager;
mod mode;

pub use group::{GroupConfig, TcGroupConfig};
pub use manager::{EditorAreaConfig, EditorAreaState, MainWindowGeometry, WindowManagerConfig};
pub use mode::{ModeConfig, ModeKind, ModeState, Side, TcRefConfig};

use serde::{Deserialize, Serialize};

/// Rectangle in pixels (absolute) or percent (relative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "horizontal" => Some(Self::Horizontal),
            "vertical" => Some(Self::Vertical),
            _ => None,
        }
    }
}

/// One segment of a split-layout path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConstraint {
    pub orientation: Orientation,
    pub index: i32,
    pub weight: f64,
}

impl SplitConstraint {
    pub fn new(orientation: Orientation, index: i32, weight: f64) -> Self {
        Self {
            orientation,
            index,
            weight,
        }
    }
}
