//! End-to-end flow over a real directory: scan, browse with gestures,
//! switch to the gallery, replace the catalog.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tempfile::tempdir;

use reelgrid::catalog::MediaKind;
use reelgrid::config::EngineConfig;
use reelgrid::engine::{Engine, EngineOptions, SelectionMirror};
use reelgrid::feed::{FeedSettings, SlotContent};
use reelgrid::gesture::{Intent, ScrollSnapRecognizer, TouchRecognizer, WheelRecognizer};
use reelgrid::local::{scan_dir, LocalFetcher};
use reelgrid::navigation::Direction;

#[derive(Default)]
struct RecordingMirror {
    published: parking_lot::Mutex<Vec<String>>,
}

impl SelectionMirror for RecordingMirror {
    fn publish(&self, content_id: &str) {
        self.published.lock().push(content_id.to_string());
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    let mut img = RgbaImage::new(width, height);
    img.put_pixel(0, 0, Rgba([0, 128, 255, 255]));
    img.save(path).unwrap();
}

fn media_dir() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("01.png"), 4, 4);
    write_png(&dir.path().join("02.png"), 6, 2);
    std::fs::write(dir.path().join("03.mp4"), vec![0u8; 512]).unwrap();
    write_png(&dir.path().join("04.png"), 3, 5);
    dir
}

fn wait_for(mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition never became true");
}

fn engine_over(dir: &Path, mirror: Arc<RecordingMirror>) -> Engine {
    let engine = Engine::new(EngineOptions {
        config: EngineConfig::default(),
        fetcher: Arc::new(LocalFetcher::new()),
        mirror: Some(mirror),
        viewport_extent: 800.0,
    });
    engine.replace_catalog(scan_dir(dir).unwrap(), None);
    engine
}

#[test]
fn swipe_through_a_scanned_directory() {
    let dir = media_dir();
    let mirror = Arc::new(RecordingMirror::default());
    let engine = engine_over(dir.path(), mirror.clone());
    assert_eq!(engine.catalog_len(), 4);

    // Swipe forward: 120px drag in 150ms clears the short-flick threshold.
    let mut touch = TouchRecognizer::new(EngineConfig::default().gesture, 800.0);
    let start = Instant::now();
    touch.begin(500.0, start);
    for step in 1..=5 {
        let t = start + Duration::from_millis(step * 30);
        engine.set_drag_offset(touch.update(500.0 - 24.0 * step as f32, t));
    }
    let intent = touch.release(380.0, start + Duration::from_millis(150));
    assert_eq!(intent, Some(Intent::Advance));
    assert_eq!(engine.gesture_ended(intent), Some(1));

    // Wheel events step one item each, no accumulation.
    let wheel = WheelRecognizer::new(&EngineConfig::default().gesture);
    engine.apply_intent(wheel.on_wheel(60.0).unwrap());
    engine.apply_intent(wheel.on_wheel(60.0).unwrap());
    assert_eq!(engine.current_index(), 3);

    // Wrap around the end.
    assert_eq!(engine.step(Direction::Forward), Some(0));

    let published = mirror.published.lock().clone();
    assert_eq!(published.len(), 5); // initial + 4 navigations
    wait_for(|| {
        engine
            .feed_frame(FeedSettings::default())
            .slots
            .iter()
            .any(|slot| slot.index == 0 && matches!(slot.content, SlotContent::Ready(_)))
    });
}

#[test]
fn scroll_snap_settles_into_a_seek() {
    let dir = media_dir();
    let engine = engine_over(dir.path(), Arc::new(RecordingMirror::default()));

    let mut snap = ScrollSnapRecognizer::new(&EngineConfig::default().gesture, 800.0);
    let start = Instant::now();
    snap.on_scroll(1620.0, start);
    let settled = snap.poll_settled(start + Duration::from_millis(200), engine.catalog_len());
    assert_eq!(settled, Some(2));
    if settled != Some(engine.current_index()) {
        snap.begin_programmatic();
        engine.seek(settled.unwrap());
        snap.end_programmatic();
    }
    assert_eq!(engine.current_index(), 2);
    assert_eq!(engine.current_kind(), Some(MediaKind::Video));
}

#[test]
fn gallery_probes_and_selection() {
    let dir = media_dir();
    let engine = engine_over(dir.path(), Arc::new(RecordingMirror::default()));

    let layout = engine.gallery_layout(900.0);
    assert_eq!(layout.len(), 4);
    let visible = engine.gallery_visible_indices(&layout, 0.0, 2000.0);
    assert_eq!(visible.len(), 4);

    for idx in visible {
        let phase = engine.gallery_cell_near(idx).unwrap();
        assert_ne!(phase, reelgrid::gallery::CellPhase::Hidden);
    }
    // The mp4 probe falls back to its extension.
    assert_eq!(
        engine.gallery_phase(2),
        Some(reelgrid::gallery::CellPhase::TypeChecked(MediaKind::Video))
    );

    assert_eq!(engine.select_from_gallery(3), Some(3));
    assert_eq!(engine.current_index(), 3);
}

#[test]
fn rescan_keeps_position_via_content_id() {
    let dir = media_dir();
    let mirror = Arc::new(RecordingMirror::default());
    let engine = engine_over(dir.path(), mirror.clone());

    engine.seek(2);
    let id = engine.current_content_id().unwrap();

    // A new file sorts ahead of everything and shifts the indices.
    write_png(&dir.path().join("00.png"), 2, 2);
    engine.replace_catalog(scan_dir(dir.path()).unwrap(), Some(&id));
    assert_eq!(engine.catalog_len(), 5);
    assert_eq!(engine.current_index(), 3);
    assert_eq!(engine.current_content_id().unwrap(), id);
}
