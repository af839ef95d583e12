//! Windowing for fixed-height list items
//!
//! Given how many items exist, how tall each one is, and where the viewport
//! sits, work out which contiguous run of indices has to be materialized.
//! Everything outside the run is represented only by the total scroll
//! extent.
//!
//! ```text
//!   offset 0 ┌──────────┐ index 0
//!            │          │
//!            ├──────────┤ ┐ start (first visible - overscan)
//! scroll_top │┄┄┄┄┄┄┄┄┄┄│ │
//!            │ viewport │ │ rendered
//!            │┄┄┄┄┄┄┄┄┄┄│ │
//!            ├──────────┤ ┘ end (last visible + overscan)
//!            │          │
//!            └──────────┘ total_height = total_items * item_height
//! ```

use std::ops::RangeInclusive;

/// Extra rows rendered on each side of the viewport by default.
pub const DEFAULT_OVERSCAN: usize = 3;

/// Distance from the bottom that counts as "reached the bottom".
pub const DEFAULT_BOTTOM_THRESHOLD: f64 = 10.0;

/// Scroll position and size of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self { scroll_top, height }
    }
}

/// One index to render and where to place it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualItem {
    pub index: usize,
    /// Vertical offset from the top of the scrollable extent.
    pub offset: f64,
}

/// The run of indices to render plus the total scrollable extent.
///
/// Either empty, or `start_index <= end_index < total_items` with one
/// [`VirtualItem`] per index in between.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    items: Vec<VirtualItem>,
    total_height: f64,
}

impl Window {
    pub fn items(&self) -> &[VirtualItem] {
        &self.items
    }

    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn start_index(&self) -> Option<usize> {
        self.items.first().map(|item| item.index)
    }

    pub fn end_index(&self) -> Option<usize> {
        self.items.last().map(|item| item.index)
    }

    pub fn range(&self) -> Option<RangeInclusive<usize>> {
        Some(self.start_index()?..=self.end_index()?)
    }
}

fn non_negative(v: f64) -> f64 {
    // NaN compares false and lands on 0 as well
    if v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Compute the window for a list of `total_items` items of `item_height`.
///
/// Pure: identical inputs always produce identical windows. A non-positive
/// or non-finite `item_height` produces an empty window.
pub fn compute_window(
    total_items: usize,
    item_height: f64,
    scroll_top: f64,
    viewport_height: f64,
    overscan: usize,
) -> Window {
    if total_items == 0 || !(item_height.is_finite() && item_height > 0.0) {
        return Window::default();
    }

    let scroll_top = non_negative(scroll_top);
    let viewport_height = non_negative(viewport_height);
    let last = total_items - 1;

    // `as usize` saturates for huge offsets
    let first_visible = (scroll_top / item_height).floor() as usize;
    let last_visible = ((scroll_top + viewport_height) / item_height).ceil() as usize;

    let end = last_visible.saturating_add(overscan).min(last);
    let start = first_visible.saturating_sub(overscan).min(end);

    let items = (start..=end)
        .map(|index| VirtualItem {
            index,
            offset: index as f64 * item_height,
        })
        .collect();

    Window {
        items,
        total_height: total_items as f64 * item_height,
    }
}

/// True when the viewport is within `threshold` of the bottom.
///
/// The scrollable extent is never shorter than the viewport, so a list
/// that does not fill the viewport always counts as at the bottom.
pub fn reached_bottom(viewport: Viewport, total_height: f64, threshold: f64) -> bool {
    let scroll_height = total_height.max(viewport.height);
    non_negative(viewport.scroll_top) + viewport.height >= scroll_height - threshold
}

/// Fixed geometry shared by every window of one list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub item_height: f64,
    pub overscan: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            item_height: 180.0,
            overscan: DEFAULT_OVERSCAN,
        }
    }
}

/// Recomputes the window when its inputs change.
///
/// Remembers only the last inputs and the window they produced, which is
/// what change detection needs.
#[derive(Debug, Clone)]
pub struct Windower {
    spec: WindowSpec,
    inputs: Option<(usize, Viewport)>,
    window: Window,
}

impl Windower {
    pub fn new(spec: WindowSpec) -> Self {
        Self {
            spec,
            inputs: None,
            window: Window::default(),
        }
    }

    pub fn spec(&self) -> WindowSpec {
        self.spec
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn viewport(&self) -> Viewport {
        self.inputs.map(|(_, viewport)| viewport).unwrap_or_default()
    }

    pub fn total_items(&self) -> usize {
        self.inputs.map(|(total, _)| total).unwrap_or(0)
    }

    /// Feed new inputs. Returns true if the window changed.
    pub fn update(&mut self, total_items: usize, viewport: Viewport) -> bool {
        if self.inputs == Some((total_items, viewport)) {
            return false;
        }
        self.inputs = Some((total_items, viewport));

        let window = compute_window(
            total_items,
            self.spec.item_height,
            viewport.scroll_top,
            viewport.height,
            self.spec.overscan,
        );
        if window == self.window {
            return false;
        }
        self.window = window;
        true
    }

    pub fn scroll_to(&mut self, scroll_top: f64) -> bool {
        let viewport = Viewport {
            scroll_top,
            ..self.viewport()
        };
        self.update(self.total_items(), viewport)
    }

    pub fn resize(&mut self, height: f64) -> bool {
        let viewport = Viewport {
            height,
            ..self.viewport()
        };
        self.update(self.total_items(), viewport)
    }

    pub fn set_total_items(&mut self, total_items: usize) -> bool {
        self.update(total_items, self.viewport())
    }

    /// Whether the current viewport is within `threshold` of the bottom.
    pub fn reached_bottom(&self, threshold: f64) -> bool {
        reached_bottom(self.viewport(), self.window.total_height, threshold)
    }
}
