use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::{Catalog, MediaDescriptor, MediaKind};
use crate::config::EngineConfig;
use crate::feed::{FeedFrame, FeedSettings, FeedVirtualizer};
use crate::fetch::MediaFetcher;
use crate::gallery::{CellPhase, GalleryLayoutItem, GalleryVirtualizer};
use crate::gesture::Intent;
use crate::navigation::{Direction, NavigationController};
use crate::preload::PreloadCache;

/// Externally-owned persistence of the current selection (deep link, URL,
/// storage). The engine publishes the current item's content id after every
/// successful navigation.
pub trait SelectionMirror: Send + Sync {
    fn publish(&self, content_id: &str);
}

pub struct EngineOptions {
    pub config: EngineConfig,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub mirror: Option<Arc<dyn SelectionMirror>>,
    /// Viewport extent along the navigation axis, in px.
    pub viewport_extent: f32,
}

struct State {
    catalog: Catalog,
    nav: NavigationController,
    feed: FeedVirtualizer,
    gallery: GalleryVirtualizer,
}

/// The facade tying the catalog, navigation, preload cache and both
/// virtualizers together. Every mutation runs under one lock, so a step or
/// seek fully applies (reconcile included, mirror published) before the
/// next one is processed; rapid gesture bursts cannot skew the index.
pub struct Engine {
    fetcher: Arc<dyn MediaFetcher>,
    cache: PreloadCache,
    mirror: Option<Arc<dyn SelectionMirror>>,
    state: Mutex<State>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let cache = PreloadCache::new(options.fetcher.clone(), options.config.preload.clone());
        let state = State {
            catalog: Catalog::empty(),
            nav: NavigationController::new(),
            feed: FeedVirtualizer::new(&options.config.feed, options.viewport_extent),
            gallery: GalleryVirtualizer::new(options.config.gallery.clone()),
        };
        Self {
            fetcher: options.fetcher,
            cache,
            mirror: options.mirror,
            state: Mutex::new(state),
        }
    }

    /// Install a new catalog ordering. All previous indices and cached
    /// handles are invalid from here on; in-flight loads are cancelled
    /// before the first reconcile against the new catalog. The initial
    /// position resolves `initial_content_id` against the new ordering and
    /// falls back to index 0.
    pub fn replace_catalog(
        &self,
        items: Vec<MediaDescriptor>,
        initial_content_id: Option<&str>,
    ) {
        let mut state = self.state.lock();
        let catalog = Catalog::new(items);
        self.cache.invalidate();

        let index = initial_content_id
            .and_then(|id| catalog.index_of(id))
            .unwrap_or(0);
        state.nav.reset(catalog.len(), index);
        state.gallery.rebuild(&catalog);
        state.feed.snap_back();
        state.catalog = catalog;

        if !state.catalog.is_empty() {
            let current = state.nav.current_index();
            self.cache.reconcile(current, &state.catalog);
            self.publish(&state, current);
        }
    }

    pub fn step(&self, direction: Direction) -> Option<usize> {
        let mut state = self.state.lock();
        let index = state.nav.step(direction)?;
        self.after_navigation(&mut state, index);
        Some(index)
    }

    pub fn seek(&self, index: usize) -> Option<usize> {
        let mut state = self.state.lock();
        let index = state.nav.seek(index)?;
        self.after_navigation(&mut state, index);
        Some(index)
    }

    /// Route a recognized gesture intent into a step.
    pub fn apply_intent(&self, intent: Intent) -> Option<usize> {
        match intent {
            Intent::Advance => self.step(Direction::Forward),
            Intent::Retreat => self.step(Direction::Back),
        }
    }

    /// Gallery selection contract: a picked cell becomes the feed position.
    pub fn select_from_gallery(&self, index: usize) -> Option<usize> {
        self.seek(index)
    }

    /// A gesture ended: apply its intent (if any) and snap the transient
    /// drag offset back regardless.
    pub fn gesture_ended(&self, intent: Option<Intent>) -> Option<usize> {
        let result = intent.and_then(|intent| self.apply_intent(intent));
        if result.is_none() {
            self.state.lock().feed.snap_back();
        }
        result
    }

    pub fn set_drag_offset(&self, offset: f32) {
        self.state.lock().feed.set_drag_offset(offset);
    }

    pub fn set_viewport_extent(&self, extent: f32) {
        self.state.lock().feed.set_viewport_extent(extent);
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().nav.current_index()
    }

    pub fn catalog_len(&self) -> usize {
        self.state.lock().catalog.len()
    }

    pub fn current_content_id(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .catalog
            .get(state.nav.current_index())
            .map(|desc| desc.content_id.clone())
    }

    pub fn descriptor(&self, index: usize) -> Option<MediaDescriptor> {
        self.state.lock().catalog.get(index).cloned()
    }

    /// Derive the feed frame for rendering from canonical state.
    pub fn feed_frame(&self, settings: FeedSettings) -> FeedFrame {
        let state = self.state.lock();
        state
            .feed
            .frame(state.nav.current_index(), &state.catalog, &self.cache, settings)
    }

    pub fn gallery_layout(&self, container_width: f32) -> Vec<GalleryLayoutItem> {
        let state = self.state.lock();
        state.gallery.layout(&state.catalog, container_width)
    }

    pub fn gallery_visible_indices(
        &self,
        layout: &[GalleryLayoutItem],
        scroll_top: f32,
        viewport_height: f32,
    ) -> Vec<usize> {
        self.state
            .lock()
            .gallery
            .visible_indices(layout, scroll_top, viewport_height)
    }

    /// A gallery cell's intersection signal fired. On the first crossing the
    /// cell's content kind is probed (cheap metadata only) to decide still
    /// vs. looping preview; the resulting phase is returned.
    pub fn gallery_cell_near(&self, index: usize) -> Option<CellPhase> {
        let mut state = self.state.lock();
        if state.gallery.mark_near_visible(index) {
            match state.catalog.get(index).cloned() {
                Some(desc) => match self.fetcher.probe_kind(&desc) {
                    Ok(kind) => state.gallery.set_kind(index, kind),
                    Err(_) => state.gallery.set_failed(index),
                },
                None => {}
            }
        }
        state.gallery.phase(index)
    }

    /// A gallery cell finished loading and knows its real dimensions.
    pub fn gallery_cell_loaded(&self, index: usize, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.gallery.set_ready(index);
        if let Some(desc) = state.catalog.get(index) {
            let content_id = desc.content_id.clone();
            state.gallery.record_measured(&content_id, width, height);
        }
    }

    pub fn gallery_cell_failed(&self, index: usize) {
        self.state.lock().gallery.set_failed(index);
    }

    pub fn gallery_phase(&self, index: usize) -> Option<CellPhase> {
        self.state.lock().gallery.phase(index)
    }

    pub fn thumbnail_url(&self, index: usize) -> Option<String> {
        let state = self.state.lock();
        state
            .catalog
            .get(index)
            .map(|desc| self.fetcher.thumbnail_url(desc))
    }

    /// Current item's kind, handy for playback wiring.
    pub fn current_kind(&self) -> Option<MediaKind> {
        let state = self.state.lock();
        state
            .catalog
            .get(state.nav.current_index())
            .map(|desc| desc.kind)
    }

    fn after_navigation(&self, state: &mut State, index: usize) {
        self.cache.reconcile(index, &state.catalog);
        state.feed.snap_back();
        self.publish(state, index);
    }

    fn publish(&self, state: &State, index: usize) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        if let Some(desc) = state.catalog.get(index) {
            mirror.publish(&desc.content_id);
        }
    }
}
