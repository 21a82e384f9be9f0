use std::collections::HashMap;

use crate::catalog::{Catalog, MediaKind};
use crate::config::GalleryConfig;

/// Derived geometry for one gallery cell. Computed fresh each layout pass,
/// never persisted across catalog changes.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryLayoutItem {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Per-cell visibility lifecycle. `Hidden -> NearVisible` is one-way so a
/// cell scrolled in and out again never repeats its type probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    Hidden,
    NearVisible,
    TypeChecked(MediaKind),
    Ready(MediaKind),
    Failed,
}

/// Masonry gallery over the entire catalog. The layout pass is O(n) and not
/// itself virtualized; only rendering is windowed to the rows intersecting
/// the visible scroll region plus a buffer.
#[derive(Debug)]
pub struct GalleryVirtualizer {
    cfg: GalleryConfig,
    cells: Vec<CellPhase>,
    /// Measured height/width ratios keyed by content id so they survive
    /// catalog reorderings.
    measured: HashMap<String, f32>,
}

impl GalleryVirtualizer {
    pub fn new(cfg: GalleryConfig) -> Self {
        Self {
            cfg,
            cells: Vec::new(),
            measured: HashMap::new(),
        }
    }

    /// Reset cell state for a (new) catalog. Measured ratios are kept; they
    /// are keyed by content id, not index.
    pub fn rebuild(&mut self, catalog: &Catalog) {
        self.cells = vec![CellPhase::Hidden; catalog.len()];
    }

    /// Columns derived from container width with device-class-aware
    /// minimums: narrow viewports get fewer, narrower columns. The maximum
    /// column width forces extra columns on very wide containers.
    pub fn column_count(&self, container_width: f32) -> usize {
        let min_width = if container_width < self.cfg.narrow_breakpoint {
            self.cfg.narrow_min_column_width
        } else {
            self.cfg.min_column_width
        };
        let fit = (container_width / min_width.max(1.0)).floor() as usize;
        let need = (container_width / self.cfg.max_column_width.max(1.0)).ceil() as usize;
        fit.max(need).max(1)
    }

    /// Shortest-column-first masonry pass over the whole catalog.
    pub fn layout(&self, catalog: &Catalog, container_width: f32) -> Vec<GalleryLayoutItem> {
        let columns = self.column_count(container_width);
        let gap = self.cfg.gap;
        let column_width = (container_width - gap * (columns - 1) as f32) / columns as f32;
        let mut heights = vec![0.0f32; columns];
        let mut items = Vec::with_capacity(catalog.len());

        for desc in catalog.items() {
            let ratio = self
                .measured
                .get(&desc.content_id)
                .copied()
                .or_else(|| desc.known_aspect_ratio())
                .unwrap_or(self.cfg.default_aspect_ratio);
            let height = column_width * ratio;
            let column = shortest_column(&heights);
            let y = heights[column];
            items.push(GalleryLayoutItem {
                index: desc.index,
                x: column as f32 * (column_width + gap),
                y,
                width: column_width,
                height,
            });
            heights[column] = y + height + gap;
        }
        items
    }

    pub fn total_height(layout: &[GalleryLayoutItem]) -> f32 {
        layout
            .iter()
            .map(|item| item.y + item.height)
            .fold(0.0, f32::max)
    }

    /// Indices whose vertical extent intersects the visible scroll region
    /// plus the render buffer.
    pub fn visible_indices(
        &self,
        layout: &[GalleryLayoutItem],
        scroll_top: f32,
        viewport_height: f32,
    ) -> Vec<usize> {
        let top = scroll_top - self.cfg.render_buffer_px;
        let bottom = scroll_top + viewport_height + self.cfg.render_buffer_px;
        layout
            .iter()
            .filter(|item| item.y + item.height >= top && item.y <= bottom)
            .map(|item| item.index)
            .collect()
    }

    pub fn phase(&self, index: usize) -> Option<CellPhase> {
        self.cells.get(index).copied()
    }

    /// A cell's own intersection signal fired: it is near-visible and should
    /// start its type probe. Returns true on the one `Hidden -> NearVisible`
    /// transition; later calls are no-ops.
    pub fn mark_near_visible(&mut self, index: usize) -> bool {
        match self.cells.get_mut(index) {
            Some(phase @ CellPhase::Hidden) => {
                *phase = CellPhase::NearVisible;
                true
            }
            _ => false,
        }
    }

    /// Record the probed content kind, deciding still vs. looping preview.
    pub fn set_kind(&mut self, index: usize, kind: MediaKind) {
        if let Some(phase) = self.cells.get_mut(index) {
            if *phase == CellPhase::NearVisible {
                *phase = CellPhase::TypeChecked(kind);
            }
        }
    }

    pub fn set_ready(&mut self, index: usize) {
        if let Some(phase) = self.cells.get_mut(index) {
            if let CellPhase::TypeChecked(kind) = *phase {
                *phase = CellPhase::Ready(kind);
            }
        }
    }

    pub fn set_failed(&mut self, index: usize) {
        if let Some(phase) = self.cells.get_mut(index) {
            if matches!(*phase, CellPhase::NearVisible | CellPhase::TypeChecked(_)) {
                *phase = CellPhase::Failed;
            }
        }
    }

    /// Post-load dimension report; the next layout pass uses the true
    /// aspect ratio instead of the fallback.
    pub fn record_measured(&mut self, content_id: &str, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.measured
            .insert(content_id.to_string(), height as f32 / width as f32);
    }

    pub fn has_measured(&self, content_id: &str) -> bool {
        self.measured.contains_key(content_id)
    }
}

fn shortest_column(heights: &[f32]) -> usize {
    let mut best = 0;
    for (idx, &height) in heights.iter().enumerate() {
        if height < heights[best] {
            best = idx;
        }
    }
    best
}
