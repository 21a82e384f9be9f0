use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::thread;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::catalog::{Catalog, MediaDescriptor, MediaKind};
use crate::config::PreloadConfig;
use crate::fetch::{CancelToken, LoadError, MediaFetcher, MediaHandle, VideoEvent, VideoHandle};

fn preload_debug_enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var("REELGRID_DEBUG")
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn preload_debug_writer() -> Option<&'static StdMutex<std::fs::File>> {
    static WRITER: OnceCell<Option<StdMutex<std::fs::File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var("REELGRID_DEBUG_LOG").ok().and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map(StdMutex::new)
                    .ok()
            })
        })
        .as_ref()
}

pub(crate) fn debug_log(message: impl AsRef<str>) {
    if !preload_debug_enabled() {
        return;
    }
    if let Some(writer) = preload_debug_writer() {
        if let Ok(mut file) = writer.lock() {
            let _ = writeln!(file, "{}", message.as_ref());
            return;
        }
    }
    eprintln!("{}", message.as_ref());
}

/// Load priority for a desired-window index. Immediate neighbors of the
/// current item outrank the same-kind video lookahead, which outranks the
/// opportunistic wider window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Cache entry lifecycle. `Failed` is terminal for its index until the
/// catalog is replaced; it is never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Loading,
    Ready,
    Failed,
}

struct Entry {
    state: EntryState,
    handle: Option<Arc<MediaHandle>>,
    cancel: CancelToken,
}

struct Task {
    generation: u64,
    descriptor: MediaDescriptor,
    priority: Priority,
    /// Wrapped distance from the current index, for tie-breaking.
    distance: usize,
    seq: u64,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then nearer, then FIFO.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.distance.cmp(&self.distance))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared {
    entries: Mutex<HashMap<usize, Entry>>,
    queue: Mutex<BinaryHeap<Task>>,
    generation: AtomicU64,
    fetcher: Arc<dyn MediaFetcher>,
    cfg: PreloadConfig,
}

/// Bounded ownership store mapping catalog index to loaded media handle,
/// fed by a priority queue and a fixed pool of loader threads.
///
/// `reconcile` is the only scheduling entry point: it computes the desired
/// window, enqueues whatever is missing and evicts everything else,
/// cancelling in-flight loads through their abort tokens. Handles are owned
/// here and lent out behind `Arc`.
pub struct PreloadCache {
    shared: Arc<Shared>,
    wake_tx: Sender<()>,
    stop_tx: Sender<()>,
    seq: AtomicU64,
    handles: Vec<thread::JoinHandle<()>>,
}

impl PreloadCache {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, cfg: PreloadConfig) -> Self {
        let workers = cfg.workers.max(1);
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            queue: Mutex::new(BinaryHeap::new()),
            generation: AtomicU64::new(0),
            fetcher,
            cfg,
        });
        let (wake_tx, wake_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let mut handles = Vec::new();
        for _ in 0..workers {
            let worker_shared = shared.clone();
            let rx_wake = wake_rx.clone();
            let rx_stop = stop_rx.clone();
            handles.push(thread::spawn(move || {
                worker_loop(worker_shared, rx_wake, rx_stop)
            }));
        }

        Self {
            shared,
            wake_tx,
            stop_tx,
            seq: AtomicU64::new(0),
            handles,
        }
    }

    /// Bring cache state into agreement with the desired window around
    /// `current_index`. Called after every navigation and after every
    /// catalog replacement.
    pub fn reconcile(&self, current_index: usize, catalog: &Catalog) {
        let generation = catalog.generation();
        if self.shared.generation.swap(generation, Ordering::SeqCst) != generation {
            self.clear_entries();
        }
        if catalog.is_empty() {
            self.clear_entries();
            return;
        }

        let desired = desired_window(current_index, catalog, self.shared.cfg.radius);
        let desired_by_index: HashMap<usize, (Priority, usize)> = desired
            .iter()
            .map(|&(idx, priority, distance)| (idx, (priority, distance)))
            .collect();

        let mut to_queue = Vec::new();
        {
            let mut entries = self.shared.entries.lock();
            entries.retain(|idx, entry| {
                if desired_by_index.contains_key(idx) {
                    return true;
                }
                entry.cancel.cancel();
                debug_log(format!("preload: evict index {idx} ({:?})", entry.state));
                false
            });

            for &(idx, priority, distance) in &desired {
                if entries.contains_key(&idx) {
                    continue;
                }
                let Some(descriptor) = catalog.get(idx) else {
                    continue;
                };
                let cancel = CancelToken::new();
                entries.insert(
                    idx,
                    Entry {
                        state: EntryState::Queued,
                        handle: None,
                        cancel: cancel.clone(),
                    },
                );
                to_queue.push(Task {
                    generation,
                    descriptor: descriptor.clone(),
                    priority,
                    distance,
                    seq: self.seq.fetch_add(1, Ordering::Relaxed),
                });
            }
        }

        if !to_queue.is_empty() {
            let mut queue = self.shared.queue.lock();
            for task in to_queue {
                debug_log(format!(
                    "preload: enqueue index {} priority {:?}",
                    task.descriptor.index, task.priority
                ));
                queue.push(task);
                let _ = self.wake_tx.send(());
            }
        }
    }

    /// Cancel every in-flight load and drop every entry. Run on catalog
    /// replacement, before any reconcile against the new catalog.
    pub fn invalidate(&self) {
        self.shared.queue.lock().clear();
        self.clear_entries();
    }

    /// Non-blocking lookup; `None` means "not ready, show a placeholder."
    pub fn get_handle(&self, index: usize) -> Option<Arc<MediaHandle>> {
        let entries = self.shared.entries.lock();
        let entry = entries.get(&index)?;
        if entry.state == EntryState::Ready {
            entry.handle.clone()
        } else {
            None
        }
    }

    pub fn entry_state(&self, index: usize) -> Option<EntryState> {
        self.shared.entries.lock().get(&index).map(|entry| entry.state)
    }

    /// Indices with a live entry, in no particular order.
    pub fn tracked_indices(&self) -> Vec<usize> {
        self.shared.entries.lock().keys().copied().collect()
    }

    fn clear_entries(&self) {
        let mut entries = self.shared.entries.lock();
        for (_, entry) in entries.drain() {
            entry.cancel.cancel();
        }
    }

    fn shutdown(&mut self) {
        self.invalidate();
        for _ in &self.handles {
            let _ = self.stop_tx.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for PreloadCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The set of indices that should currently be preloaded: wrapped
/// `current ± radius`, plus the next video-kind index (wrap-aware) when the
/// current item is itself a video, so video-to-video transitions are
/// buffered even across intervening images.
pub fn desired_window(
    current: usize,
    catalog: &Catalog,
    radius: usize,
) -> Vec<(usize, Priority, usize)> {
    let len = catalog.len();
    if len == 0 || current >= len {
        return Vec::new();
    }

    let mut window: HashMap<usize, (Priority, usize)> = HashMap::new();
    window.insert(current, (Priority::High, 0));
    for distance in 1..=radius {
        if distance >= len {
            break;
        }
        let priority = if distance == 1 {
            Priority::High
        } else {
            Priority::Low
        };
        let ahead = (current + distance) % len;
        let behind = (current + len - distance) % len;
        for idx in [ahead, behind] {
            let slot = window.entry(idx).or_insert((priority, distance));
            if priority > slot.0 {
                *slot = (priority, distance);
            }
        }
    }

    if catalog.get(current).map(|d| d.kind) == Some(MediaKind::Video) {
        if let Some(video_idx) = catalog.next_video_after(current) {
            let distance = (video_idx + len - current) % len;
            let slot = window.entry(video_idx).or_insert((Priority::Medium, distance));
            if Priority::Medium > slot.0 {
                slot.0 = Priority::Medium;
            }
        }
    }

    let mut out: Vec<(usize, Priority, usize)> = window
        .into_iter()
        .map(|(idx, (priority, distance))| (idx, priority, distance))
        .collect();
    // Highest priority first so the queue fills in a useful order.
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    out
}

fn worker_loop(shared: Arc<Shared>, wake_rx: Receiver<()>, stop_rx: Receiver<()>) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(wake_rx) -> msg => {
                if msg.is_err() {
                    break;
                }
                if let Some((task, cancel)) = next_task(&shared) {
                    run_task(&shared, task, cancel);
                }
            }
        }
    }
}

/// Pop the highest-priority task that still corresponds to a live `Queued`
/// entry of the current generation, marking it `Loading`. Stale tasks
/// (evicted, replaced catalog) are discarded on the way.
fn next_task(shared: &Shared) -> Option<(Task, CancelToken)> {
    loop {
        let task = shared.queue.lock().pop()?;
        if task.generation != shared.generation.load(Ordering::SeqCst) {
            continue;
        }
        let mut entries = shared.entries.lock();
        match entries.get_mut(&task.descriptor.index) {
            Some(entry) if entry.state == EntryState::Queued => {
                entry.state = EntryState::Loading;
                let cancel = entry.cancel.clone();
                drop(entries);
                return Some((task, cancel));
            }
            _ => continue,
        }
    }
}

fn run_task(shared: &Shared, task: Task, cancel: CancelToken) {
    if cancel.is_cancelled() {
        return;
    }
    let result = match task.descriptor.kind {
        MediaKind::Image => shared
            .fetcher
            .fetch_image(&task.descriptor, &cancel)
            .map(MediaHandle::Image),
        MediaKind::Video => load_video(shared, &task, &cancel),
    };
    complete(shared, &task, &cancel, result);
}

/// Video readiness with grace-period fallbacks: resolve on the
/// can-play-through signal; once the first frame is available wait at most
/// one grace period for it; never wait past the hard cap. Prioritized tasks
/// get the shorter grace so the item on deck becomes usable sooner.
fn load_video(shared: &Shared, task: &Task, cancel: &CancelToken) -> Result<MediaHandle, LoadError> {
    let stream = shared.fetcher.open_video(&task.descriptor)?;
    let grace = if task.priority >= Priority::Medium {
        shared.cfg.priority_grace
    } else {
        shared.cfg.opportunistic_grace
    };

    let mut deadline = std::time::Instant::now() + shared.cfg.video_wait_cap;
    let mut first_frame = false;

    let can_play_through = loop {
        let now = std::time::Instant::now();
        if now >= deadline {
            break false;
        }
        select! {
            recv(cancel.cancelled()) -> _ => return Err(LoadError::Aborted),
            recv(stream.events) -> event => match event {
                Ok(VideoEvent::CanPlayThrough) => break true,
                Ok(VideoEvent::FirstFrame) => {
                    first_frame = true;
                    deadline = deadline.min(std::time::Instant::now() + grace);
                }
                Ok(VideoEvent::Failed(message)) => {
                    return Err(LoadError::Failed(message));
                }
                // Stream ended without a readiness verdict: usable if we at
                // least saw a frame, a failure otherwise.
                Err(_) => {
                    if first_frame {
                        break false;
                    }
                    return Err(LoadError::failed("video stream closed before first frame"));
                }
            },
            default(deadline - now) => break false,
        }
    };

    Ok(MediaHandle::Video(VideoHandle {
        source: stream.source,
        can_play_through,
        width: stream.width,
        height: stream.height,
    }))
}

fn complete(
    shared: &Shared,
    task: &Task,
    cancel: &CancelToken,
    result: Result<MediaHandle, LoadError>,
) {
    if task.generation != shared.generation.load(Ordering::SeqCst) {
        return;
    }
    let mut entries = shared.entries.lock();
    let index = task.descriptor.index;
    let Some(entry) = entries.get_mut(&index) else {
        // Evicted while loading; the handle (if any) drops here.
        return;
    };
    // The entry may have been evicted and re-created since this task was
    // dequeued; only a completion holding the entry's own token may apply.
    if !entry.cancel.same_as(cancel) || entry.state != EntryState::Loading {
        return;
    }
    match result {
        Ok(handle) => {
            entry.state = EntryState::Ready;
            entry.handle = Some(Arc::new(handle));
        }
        Err(LoadError::Aborted) => {
            // Expected outcome of eviction; nothing to surface.
            entries.remove(&index);
        }
        Err(LoadError::Failed(message)) => {
            debug_log(format!("preload: index {index} failed: {message}"));
            entry.state = EntryState::Failed;
            entry.handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ImageHandle, VideoStream};
    use crossbeam_channel::bounded;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    fn catalog(kinds: &[MediaKind]) -> Catalog {
        let items = kinds
            .iter()
            .enumerate()
            .map(|(idx, &kind)| MediaDescriptor {
                index: idx,
                content_id: format!("item-{idx}"),
                kind,
                path: format!("/media/item-{idx}"),
                known_width: None,
                known_height: None,
            })
            .collect();
        Catalog::new(items)
    }

    fn image_catalog(len: usize) -> Catalog {
        catalog(&vec![MediaKind::Image; len])
    }

    fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Fetcher whose image loads either resolve instantly, fail, or block
    /// until their token aborts.
    #[derive(Default)]
    struct StubFetcher {
        image_calls: Mutex<Vec<usize>>,
        aborted: Mutex<Vec<usize>>,
        fail_indices: Vec<usize>,
        block_until_cancel: bool,
        // Held so video event channels stay open and readiness resolves via
        // the grace timer rather than stream closure.
        video_senders: Mutex<Vec<crossbeam_channel::Sender<VideoEvent>>>,
    }

    impl MediaFetcher for StubFetcher {
        fn fetch_image(
            &self,
            desc: &MediaDescriptor,
            cancel: &CancelToken,
        ) -> Result<ImageHandle, LoadError> {
            self.image_calls.lock().push(desc.index);
            if self.block_until_cancel {
                if cancel
                    .cancelled()
                    .recv_timeout(Duration::from_secs(3))
                    .is_ok()
                {
                    self.aborted.lock().push(desc.index);
                    return Err(LoadError::Aborted);
                }
                return Err(LoadError::failed("stub never cancelled"));
            }
            if self.fail_indices.contains(&desc.index) {
                return Err(LoadError::failed("stub failure"));
            }
            Ok(ImageHandle {
                width: 2,
                height: 2,
                rgba: vec![0; 16],
            })
        }

        fn open_video(&self, desc: &MediaDescriptor) -> Result<VideoStream, LoadError> {
            let (tx, rx) = bounded(2);
            let _ = tx.send(VideoEvent::FirstFrame);
            self.video_senders.lock().push(tx);
            Ok(VideoStream {
                source: desc.path.clone(),
                events: rx,
                width: None,
                height: None,
            })
        }

        fn probe_kind(&self, desc: &MediaDescriptor) -> Result<MediaKind, LoadError> {
            Ok(desc.kind)
        }
    }

    #[test]
    fn desired_window_wraps_around_the_catalog() {
        let cat = image_catalog(10);
        let window = desired_window(0, &cat, 2);
        let indices: HashSet<usize> = window.iter().map(|&(idx, _, _)| idx).collect();
        assert_eq!(indices, HashSet::from([8, 9, 0, 1, 2]));
    }

    #[test]
    fn desired_window_priorities() {
        let cat = image_catalog(10);
        let window = desired_window(5, &cat, 2);
        let priority_of = |idx: usize| {
            window
                .iter()
                .find(|&&(i, _, _)| i == idx)
                .map(|&(_, p, _)| p)
                .unwrap()
        };
        assert_eq!(priority_of(5), Priority::High);
        assert_eq!(priority_of(4), Priority::High);
        assert_eq!(priority_of(6), Priority::High);
        assert_eq!(priority_of(3), Priority::Low);
        assert_eq!(priority_of(7), Priority::Low);
    }

    #[test]
    fn desired_window_small_catalog_has_no_duplicates() {
        let cat = image_catalog(3);
        let window = desired_window(1, &cat, 2);
        let mut indices: Vec<usize> = window.iter().map(|&(idx, _, _)| idx).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn video_lookahead_joins_window_beyond_radius() {
        let mut kinds = vec![MediaKind::Image; 12];
        kinds[2] = MediaKind::Video;
        kinds[9] = MediaKind::Video;
        let cat = catalog(&kinds);
        let window = desired_window(2, &cat, 2);
        let lookahead = window.iter().find(|&&(idx, _, _)| idx == 9);
        assert_eq!(lookahead.map(|&(_, p, _)| p), Some(Priority::Medium));
    }

    #[test]
    fn video_lookahead_wraps_backwards_past_zero() {
        let mut kinds = vec![MediaKind::Image; 8];
        kinds[6] = MediaKind::Video;
        kinds[1] = MediaKind::Video;
        let cat = catalog(&kinds);
        let window = desired_window(6, &cat, 2);
        assert!(window.iter().any(|&(idx, _, _)| idx == 1));
    }

    #[test]
    fn task_heap_orders_by_priority_then_distance() {
        let mut heap = BinaryHeap::new();
        let task = |index: usize, priority: Priority, distance: usize, seq: u64| Task {
            generation: 1,
            descriptor: MediaDescriptor {
                index,
                content_id: format!("t{index}"),
                kind: MediaKind::Image,
                path: String::new(),
                known_width: None,
                known_height: None,
            },
            priority,
            distance,
            seq,
        };
        heap.push(task(3, Priority::Low, 2, 0));
        heap.push(task(9, Priority::Medium, 7, 1));
        heap.push(task(1, Priority::High, 1, 2));
        heap.push(task(7, Priority::Low, 2, 3));
        assert_eq!(heap.pop().unwrap().descriptor.index, 1);
        assert_eq!(heap.pop().unwrap().descriptor.index, 9);
        // Equal priority and distance: FIFO by sequence.
        assert_eq!(heap.pop().unwrap().descriptor.index, 3);
        assert_eq!(heap.pop().unwrap().descriptor.index, 7);
    }

    #[test]
    fn entries_stay_within_the_desired_window() {
        let fetcher = Arc::new(StubFetcher::default());
        let cache = PreloadCache::new(fetcher, PreloadConfig::default());
        let cat = image_catalog(10);

        cache.reconcile(0, &cat);
        assert!(wait_until(|| {
            [8, 9, 0, 1, 2]
                .iter()
                .all(|&idx| cache.entry_state(idx) == Some(EntryState::Ready))
        }));
        let expected: HashSet<usize> = HashSet::from([8, 9, 0, 1, 2]);
        let tracked: HashSet<usize> = cache.tracked_indices().into_iter().collect();
        assert_eq!(tracked, expected);
        assert!(cache.get_handle(0).is_some());
        assert!(cache.get_handle(5).is_none());
    }

    #[test]
    fn eviction_aborts_inflight_loads() {
        let fetcher = Arc::new(StubFetcher {
            block_until_cancel: true,
            ..StubFetcher::default()
        });
        let cache = PreloadCache::new(fetcher.clone(), PreloadConfig::default());
        let cat = image_catalog(12);

        cache.reconcile(0, &cat);
        assert!(wait_until(|| {
            cache
                .tracked_indices()
                .iter()
                .any(|&idx| cache.entry_state(idx) == Some(EntryState::Loading))
        }));

        // Window around 6 = {4,5,6,7,8}, disjoint from {10,11,0,1,2}.
        cache.reconcile(6, &cat);
        assert!(wait_until(|| !fetcher.aborted.lock().is_empty()));
        let tracked: HashSet<usize> = cache.tracked_indices().into_iter().collect();
        for idx in [10, 11, 0, 1, 2] {
            assert!(!tracked.contains(&idx), "index {idx} should be evicted");
        }
    }

    #[test]
    fn at_most_three_loads_in_flight() {
        let fetcher = Arc::new(StubFetcher {
            block_until_cancel: true,
            ..StubFetcher::default()
        });
        let cache = PreloadCache::new(fetcher, PreloadConfig::default());
        let cat = image_catalog(10);

        cache.reconcile(0, &cat);
        let loading = || {
            cache
                .tracked_indices()
                .iter()
                .filter(|&&idx| cache.entry_state(idx) == Some(EntryState::Loading))
                .count()
        };
        assert!(wait_until(|| loading() == 3));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(loading(), 3);
    }

    #[test]
    fn catalog_replacement_clears_every_entry() {
        let fetcher = Arc::new(StubFetcher::default());
        let cache = PreloadCache::new(fetcher, PreloadConfig::default());
        let old = image_catalog(6);

        cache.reconcile(0, &old);
        assert!(wait_until(|| cache.get_handle(0).is_some()));

        cache.invalidate();
        assert!(cache.tracked_indices().is_empty());
        assert!(cache.get_handle(0).is_none());

        let new = image_catalog(6);
        cache.reconcile(3, &new);
        assert!(wait_until(|| cache.get_handle(3).is_some()));
    }

    #[test]
    fn stale_generation_results_never_land() {
        let fetcher = Arc::new(StubFetcher {
            block_until_cancel: true,
            ..StubFetcher::default()
        });
        let cache = PreloadCache::new(fetcher, PreloadConfig::default());
        let old = image_catalog(6);
        cache.reconcile(0, &old);
        assert!(wait_until(|| {
            cache
                .tracked_indices()
                .iter()
                .any(|&idx| cache.entry_state(idx) == Some(EntryState::Loading))
        }));

        let new = image_catalog(6);
        cache.invalidate();
        cache.reconcile(0, &new);
        // Old-generation completions (all aborting now) must not satisfy
        // lookups against the new catalog: new entries block forever, so
        // nothing may ever reach Ready.
        thread::sleep(Duration::from_millis(100));
        for idx in cache.tracked_indices() {
            let state = cache.entry_state(idx);
            assert!(
                state == Some(EntryState::Queued) || state == Some(EntryState::Loading),
                "index {idx} unexpectedly {state:?}"
            );
            assert!(cache.get_handle(idx).is_none());
        }
    }

    #[test]
    fn failed_loads_are_terminal_until_catalog_change() {
        let fetcher = Arc::new(StubFetcher {
            fail_indices: vec![1],
            ..StubFetcher::default()
        });
        let cache = PreloadCache::new(fetcher.clone(), PreloadConfig::default());
        let cat = image_catalog(6);

        cache.reconcile(0, &cat);
        assert!(wait_until(|| cache.entry_state(1) == Some(EntryState::Failed)));
        assert!(cache.get_handle(1).is_none());

        cache.reconcile(0, &cat);
        cache.reconcile(1, &cat);
        thread::sleep(Duration::from_millis(50));
        let attempts = fetcher
            .image_calls
            .lock()
            .iter()
            .filter(|&&idx| idx == 1)
            .count();
        assert_eq!(attempts, 1);
        // Failure is local: siblings still load.
        assert!(wait_until(|| cache.get_handle(0).is_some()));
    }

    #[test]
    fn video_resolves_by_grace_after_first_frame() {
        let fetcher = Arc::new(StubFetcher::default());
        let cfg = PreloadConfig {
            priority_grace: Duration::from_millis(30),
            opportunistic_grace: Duration::from_millis(30),
            video_wait_cap: Duration::from_millis(500),
            ..PreloadConfig::default()
        };
        let cache = PreloadCache::new(fetcher, cfg);
        let cat = catalog(&[MediaKind::Video, MediaKind::Image, MediaKind::Image]);

        cache.reconcile(0, &cat);
        assert!(wait_until(|| cache.get_handle(0).is_some()));
        let handle = cache.get_handle(0).unwrap();
        match handle.as_ref() {
            MediaHandle::Video(video) => assert!(!video.can_play_through),
            other => panic!("expected video handle, got {other:?}"),
        }
    }
}
