use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::catalog::{MediaDescriptor, MediaKind};

/// Errors a load can end in. `Aborted` is the expected outcome of eviction
/// and is swallowed by the cache; only `Failed` ever reaches a placeholder.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("media load failed: {0}")]
    Failed(String),
    #[error("media load aborted")]
    Aborted,
}

impl LoadError {
    pub fn failed(err: impl fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Idempotent abort signal attached to every in-flight load. `cancel` flips
/// the flag and fires the channel at most once, so selects wake exactly one
/// time no matter how often eviction runs.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Receiver half for `select!` loops waiting on readiness events.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.rx
    }

    pub(crate) fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Fully decoded image pixels, RGBA8.
pub struct ImageHandle {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// A video whose source has been attached and buffered to the point the
/// player can start. `can_play_through` is false when readiness was resolved
/// by a grace-period fallback instead of the real signal.
#[derive(Debug, Clone)]
pub struct VideoHandle {
    pub source: String,
    pub can_play_through: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Loaded media resource, owned by the preload cache and handed out behind
/// `Arc` so consumers only ever borrow it read-only.
#[derive(Debug)]
pub enum MediaHandle {
    Image(ImageHandle),
    Video(VideoHandle),
}

impl MediaHandle {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Image(image) => Some((image.width, image.height)),
            Self::Video(video) => video.width.zip(video.height),
        }
    }
}

/// Readiness signals emitted while a video buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEvent {
    /// Enough data decoded to show the first frame.
    FirstFrame,
    /// The player estimates playback will not stall.
    CanPlayThrough,
    Failed(String),
}

/// An attached video source plus its readiness event stream. The cache
/// worker drives the grace-period state machine over `events`.
pub struct VideoStream {
    pub source: String,
    pub events: Receiver<VideoEvent>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// The resource-fetch boundary. Everything behind it (filesystem, HTTP,
/// thumbnail endpoints) is an external collaborator; the engine only needs
/// these four operations.
pub trait MediaFetcher: Send + Sync {
    /// Fetch and fully decode an image. Implementations should check
    /// `cancel` at their suspension points and return `LoadError::Aborted`.
    fn fetch_image(
        &self,
        desc: &MediaDescriptor,
        cancel: &CancelToken,
    ) -> Result<ImageHandle, LoadError>;

    /// Attach a video source and return its readiness stream.
    fn open_video(&self, desc: &MediaDescriptor) -> Result<VideoStream, LoadError>;

    /// Cheap metadata probe of the thumbnail-resolution resource's content
    /// kind; must not download or decode the full media.
    fn probe_kind(&self, desc: &MediaDescriptor) -> Result<MediaKind, LoadError>;

    /// Reference to the full-resolution resource.
    fn full_url(&self, desc: &MediaDescriptor) -> String {
        desc.path.clone()
    }

    /// Reference to the gallery-thumbnail-resolution resource.
    fn thumbnail_url(&self, desc: &MediaDescriptor) -> String {
        desc.path.clone()
    }
}
