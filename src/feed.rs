use std::sync::Arc;

use crate::catalog::{Catalog, MediaKind};
use crate::config::FeedConfig;
use crate::fetch::MediaHandle;
use crate::preload::{EntryState, PreloadCache};

/// Ambient UI preferences snapshotted into each frame so the engine never
/// reads mutable global state.
#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub muted: bool,
    pub autoplay_videos: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            muted: true,
            autoplay_videos: true,
        }
    }
}

/// What a rendered slot shows. `Loading` is not an error: the consumer
/// renders the item with its own fetch and a loading indicator, because the
/// preload cache is a latency optimization, never a correctness dependency.
#[derive(Debug, Clone)]
pub enum SlotContent {
    Ready(Arc<MediaHandle>),
    Loading,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Playing,
    Paused,
}

/// One rendered item of the feed strip.
#[derive(Debug, Clone)]
pub struct FeedSlot {
    pub index: usize,
    /// Absolute position along the navigation axis: `index * viewport_extent`.
    pub offset: f32,
    pub content: SlotContent,
    pub playback: Playback,
    pub muted: bool,
}

/// A derived frame: the thin rendered window plus the strip transform that
/// slides it. Recomputed from canonical state on every pass.
#[derive(Debug, Clone)]
pub struct FeedFrame {
    pub slots: Vec<FeedSlot>,
    /// Translation to apply to the whole strip; already includes any
    /// transient drag offset.
    pub transform: f32,
}

/// Renders only the current index plus a configurable buffer of one or two
/// neighbors per side. Exactly one video plays at a time (the current one);
/// everything outside the window is not rendered at all, which is what
/// releases its playback resources.
#[derive(Debug)]
pub struct FeedVirtualizer {
    buffer: usize,
    viewport_extent: f32,
    drag_offset: f32,
}

impl FeedVirtualizer {
    pub fn new(cfg: &FeedConfig, viewport_extent: f32) -> Self {
        Self {
            buffer: cfg.buffer.clamp(1, 2),
            viewport_extent,
            drag_offset: 0.0,
        }
    }

    pub fn set_viewport_extent(&mut self, extent: f32) {
        self.viewport_extent = extent;
    }

    pub fn viewport_extent(&self) -> f32 {
        self.viewport_extent
    }

    /// Transient offset applied during an in-flight gesture.
    pub fn set_drag_offset(&mut self, offset: f32) {
        self.drag_offset = offset;
    }

    /// Reconcile after a gesture ends, whether or not it navigated.
    pub fn snap_back(&mut self) {
        self.drag_offset = 0.0;
    }

    /// Contiguous rendered indices around `current`, wrapped, ordered from
    /// the furthest-behind neighbor to the furthest-ahead one.
    pub fn window(&self, current: usize, catalog_len: usize) -> Vec<usize> {
        if catalog_len == 0 {
            return Vec::new();
        }
        let buffer = self.buffer.min(catalog_len.saturating_sub(1) / 2 + 1);
        let mut indices = Vec::with_capacity(buffer * 2 + 1);
        let span = -(buffer as isize)..=(buffer as isize);
        for offset in span {
            let idx = wrap_index(current, offset, catalog_len);
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }
        indices
    }

    /// Derive the rendered frame from canonical state. Pure with respect to
    /// everything but the cache lookups.
    pub fn frame(
        &self,
        current: usize,
        catalog: &Catalog,
        cache: &PreloadCache,
        settings: FeedSettings,
    ) -> FeedFrame {
        let mut slots = Vec::new();
        for index in self.window(current, catalog.len()) {
            let content = match cache.entry_state(index) {
                Some(EntryState::Ready) => match cache.get_handle(index) {
                    Some(handle) => SlotContent::Ready(handle),
                    None => SlotContent::Loading,
                },
                Some(EntryState::Failed) => SlotContent::Failed,
                _ => SlotContent::Loading,
            };
            let is_video = catalog.get(index).map(|d| d.kind) == Some(MediaKind::Video);
            let playback = if is_video && index == current && settings.autoplay_videos {
                Playback::Playing
            } else {
                Playback::Paused
            };
            slots.push(FeedSlot {
                index,
                offset: index as f32 * self.viewport_extent,
                content,
                playback,
                muted: settings.muted,
            });
        }
        FeedFrame {
            slots,
            transform: self.strip_transform(current),
        }
    }

    /// Base translation for the strip so the current item fills the
    /// viewport, plus the transient drag offset while a gesture is live.
    pub fn strip_transform(&self, current: usize) -> f32 {
        -(current as f32) * self.viewport_extent + self.drag_offset
    }
}

fn wrap_index(current: usize, offset: isize, len: usize) -> usize {
    let len = len as isize;
    (((current as isize + offset) % len + len) % len) as usize
}
