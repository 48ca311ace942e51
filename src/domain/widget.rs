// Widget definition and grid placement domain models
use serde_json::Value;

/// Output-type tag used to route a widget's opaque output to a renderer.
/// The core never inspects the output's internal shape, only this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    Graph,
    Table,
    Kpi,
}

/// Grid-unit rectangle plus the type-derived size floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub min_h: u32,
}

impl Position {
    pub fn new(x: u32, y: u32, w: u32, h: u32, min_w: u32, min_h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            min_w,
            min_h,
        }
    }

    /// Bottom edge in grid units.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// A widget definition: a reference to an externally computed component plus
/// the cached output it produced. Spatial arrangement lives on the
/// [`DashboardItem`] wrapping it, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: String,
    pub title: String,
    pub ref_id: String,
    pub ref_version: String,
    pub ref_type: String,
    pub output_type: OutputType,
    pub output: Option<Value>,
}

/// A placed widget: identity, the definition it references, and a position.
/// Kept separate from [`Widget`] so moves, resizes, and deletions mutate the
/// arrangement without touching the widget's content.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardItem {
    pub id: String,
    pub widget: Widget,
    pub position: Position,
}

impl DashboardItem {
    pub fn new(id: String, widget: Widget, position: Position) -> Self {
        Self {
            id,
            widget,
            position,
        }
    }
}
