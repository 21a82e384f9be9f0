use std::sync::atomic::{AtomicU64, Ordering};

/// What a descriptor ultimately renders as. Decides the load path in the
/// preload cache and the playback rules in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// One item of the ordered media list. Immutable once produced; `index` is
/// only meaningful against the catalog generation that produced it.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub index: usize,
    /// Stable, content-derived id that survives reorderings and filters.
    pub content_id: String,
    pub kind: MediaKind,
    pub path: String,
    pub known_width: Option<u32>,
    pub known_height: Option<u32>,
}

impl MediaDescriptor {
    pub fn known_aspect_ratio(&self) -> Option<f32> {
        match (self.known_width, self.known_height) {
            (Some(w), Some(h)) if w > 0 => Some(h as f32 / w as f32),
            _ => None,
        }
    }
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Ordered, zero-indexed view over the media list. Replacing the catalog
/// (filter change, rescan) produces a new generation; every index and every
/// cached handle from an older generation is invalid against it.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<MediaDescriptor>,
    generation: u64,
}

impl Catalog {
    pub fn new(mut items: Vec<MediaDescriptor>) -> Self {
        for (idx, item) in items.iter_mut().enumerate() {
            item.index = idx;
        }
        Self {
            items,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaDescriptor> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[MediaDescriptor] {
        &self.items
    }

    /// Resolve a persisted content id back to an index in this ordering.
    pub fn index_of(&self, content_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.content_id == content_id)
    }

    /// Next video-kind index scanning forward from `start` with wraparound,
    /// skipping `start` itself. `None` when no other video exists.
    pub fn next_video_after(&self, start: usize) -> Option<usize> {
        let len = self.items.len();
        if len < 2 || start >= len {
            return None;
        }
        (1..len)
            .map(|offset| (start + offset) % len)
            .find(|&idx| self.items[idx].kind == MediaKind::Video)
    }
}
