// Spatial placement engine - collision-free grid arrangement and canvas sizing
//
// Everything here is a pure function of the item list plus an explicit
// interaction flag, so callers can invoke it on every pointer tick.
use crate::domain::{DashboardItem, OutputType, Position};

/// Default column count of the editor grid.
pub const DEFAULT_GRID_COLS: u32 = 48;

/// Floor on the number of downward probe attempts. The effective bound is
/// `max(existing.len() * 10, PROBE_ATTEMPT_CAP)`. Tunable heuristic, not an
/// invariant.
pub const PROBE_ATTEMPT_CAP: usize = 100;

/// Ceiling on the probed `y` coordinate. Tunable heuristic.
pub const PROBE_ROW_CEILING: u32 = 200;

/// Pixel height of one grid row.
pub const ROW_UNIT_PX: f32 = 16.0;

/// Rows of breathing room added below the lowest item.
pub const CANVAS_PADDING_ROWS: u32 = 2;

/// Hard cap on the computed canvas height.
pub const MAX_CANVAS_PX: f32 = 6400.0;

/// Canvas height relative to the viewport when a tab has no items yet.
pub const EMPTY_CANVAS_VIEWPORT_RATIO: f32 = 0.75;

/// How close (in px) a dragged pointer must be to the canvas bottom before
/// the canvas grows ahead of it.
pub const BOTTOM_GROW_THRESHOLD_PX: f32 = 64.0;

/// Fixed increment added while dragging near the bottom edge, so drop
/// targets exist below the current last row.
pub const DRAG_GROW_PX: f32 = 160.0;

/// Pointer interaction in progress, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Idle,
    /// An active resize; callers pass the in-progress geometry in `items`.
    Resizing,
    /// An active drag with the pointer at this canvas-relative y in px.
    Dragging { pointer_y: f32 },
}

/// Per-type minimum size in grid units.
pub fn minimums_for(kind: OutputType) -> (u32, u32) {
    match kind {
        OutputType::Graph | OutputType::Table => (8, 6),
        OutputType::Kpi => (4, 2),
    }
}

/// Per-type default size in grid units. Tables and graphs land large, KPIs
/// small.
pub fn default_size_for(kind: OutputType) -> (u32, u32) {
    match kind {
        OutputType::Graph | OutputType::Table => (16, 8),
        OutputType::Kpi => (8, 4),
    }
}

/// Strict axis-aligned intersection. Rectangles sharing only an edge do not
/// overlap.
pub fn overlaps(a: &Position, b: &Position) -> bool {
    a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
}

fn collides(candidate: &Position, existing: &[Position]) -> bool {
    existing.iter().any(|p| overlaps(candidate, p))
}

/// Raise `w`/`h` to the type's minimums and stamp the derived floor onto the
/// position.
pub fn clamp_to_minimums(kind: OutputType, position: Position) -> Position {
    let (min_w, min_h) = minimums_for(kind);
    Position {
        w: position.w.max(min_w),
        h: position.h.max(min_h),
        min_w,
        min_h,
        ..position
    }
}

/// Resolve a dropped candidate against the existing arrangement.
///
/// Returns the candidate unchanged when it fits. On collision, keeps `x`
/// fixed and probes downward one row at a time until a free slot is found or
/// the attempt bound runs out, in which case the item stacks below the lowest
/// existing bottom edge.
pub fn place_new_item(candidate: Position, existing: &[Position], max_cols: u32) -> Position {
    let mut candidate = candidate;
    if candidate.x + candidate.w > max_cols {
        candidate.x = max_cols.saturating_sub(candidate.w);
    }

    if !collides(&candidate, existing) {
        return candidate;
    }

    let bound = (existing.len() * 10).max(PROBE_ATTEMPT_CAP);
    let mut probe = candidate;
    for _ in 0..bound {
        probe.y += 1;
        if probe.y > PROBE_ROW_CEILING {
            break;
        }
        if !collides(&probe, existing) {
            return probe;
        }
    }

    // Bound exhausted: stack below everything at the candidate's column.
    let stacked_y = existing.iter().map(Position::bottom).max().unwrap_or(0);
    Position {
        y: stacked_y,
        ..candidate
    }
}

/// Apply a batch of position changes to a tab's items, clamping each to its
/// type minimums. Returns `None` when the clamped result is identical to the
/// current arrangement, so callers skip the mutation and the persistence
/// call entirely. Layout engines fire on every pointer tick even without
/// real movement; this is what keeps those ticks free.
pub fn normalize_layout(
    items: &[DashboardItem],
    changes: &[(String, Position)],
) -> Option<Vec<DashboardItem>> {
    let next: Vec<DashboardItem> = items
        .iter()
        .map(|item| {
            match changes.iter().find(|(id, _)| *id == item.id) {
                Some((_, position)) => {
                    let clamped = clamp_to_minimums(item.widget.output_type, *position);
                    DashboardItem {
                        position: clamped,
                        ..item.clone()
                    }
                }
                None => item.clone(),
            }
        })
        .collect();

    if next == items {
        None
    } else {
        Some(next)
    }
}

/// Compute the pixel height the canvas needs for the given arrangement.
///
/// During a drag whose pointer is near the bottom edge the canvas grows by a
/// fixed increment ahead of the pointer. With zero items the height defaults
/// relative to the viewport instead of collapsing to zero.
pub fn compute_canvas_height(
    items: &[Position],
    interaction: Interaction,
    viewport_height: f32,
) -> f32 {
    let Some(max_bottom) = items.iter().map(Position::bottom).max() else {
        return (viewport_height * EMPTY_CANVAS_VIEWPORT_RATIO).min(MAX_CANVAS_PX);
    };

    let base = (max_bottom + CANVAS_PADDING_ROWS) as f32 * ROW_UNIT_PX;
    let height = match interaction {
        Interaction::Idle | Interaction::Resizing => base,
        Interaction::Dragging { pointer_y } => {
            if pointer_y >= base - BOTTOM_GROW_THRESHOLD_PX {
                base + DRAG_GROW_PX
            } else {
                base
            }
        }
    };
    height.min(MAX_CANVAS_PX)
}
