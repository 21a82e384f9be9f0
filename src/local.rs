use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use sha1::{Digest, Sha1};
use walkdir::WalkDir;

use crate::catalog::{MediaDescriptor, MediaKind};
use crate::fetch::{
    CancelToken, ImageHandle, LoadError, MediaFetcher, VideoEvent, VideoStream,
};

const IMAGE_EXTS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff"];
const VIDEO_EXTS: [&str; 5] = ["mp4", "webm", "mkv", "mov", "avi"];

/// Bytes hashed for the content id; enough to tell items apart without
/// reading whole videos.
const CONTENT_ID_PREFIX: usize = 64 * 1024;

const PROBE_BYTES: usize = 512;

fn kind_for_path(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Content-derived id: sha1 over the file length and the first 64KiB. The
/// same bytes get the same id no matter where the item sits in the ordering.
fn content_id(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("local: open {} for hashing", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("local: stat {}", path.display()))?
        .len();
    let mut prefix = vec![0u8; CONTENT_ID_PREFIX];
    let read = read_up_to(&mut file, &mut prefix)
        .with_context(|| format!("local: read {}", path.display()))?;

    let mut hasher = Sha1::new();
    hasher.update(len.to_le_bytes());
    hasher.update(&prefix[..read]);
    Ok(hex::encode(hasher.finalize()))
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

/// Scan a directory tree into an ordered descriptor list: media files only,
/// sorted by path so the ordering is deterministic across rescans.
pub fn scan_dir(dir: impl AsRef<Path>) -> Result<Vec<MediaDescriptor>> {
    let mut paths: Vec<(PathBuf, MediaKind)> = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).follow_links(false) {
        let entry = entry.context("local: walk directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = kind_for_path(entry.path()) {
            paths.push((entry.path().to_path_buf(), kind));
        }
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut items = Vec::with_capacity(paths.len());
    for (index, (path, kind)) in paths.into_iter().enumerate() {
        let content_id = content_id(&path)?;
        items.push(MediaDescriptor {
            index,
            content_id,
            kind,
            path: path.to_string_lossy().to_string(),
            known_width: None,
            known_height: None,
        });
    }
    Ok(items)
}

/// Fetcher over local files. Images are fully decoded on the worker; local
/// videos are already seekable on disk, so both readiness signals fire as
/// soon as the source checks out.
#[derive(Debug, Default)]
pub struct LocalFetcher;

impl LocalFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl MediaFetcher for LocalFetcher {
    fn fetch_image(
        &self,
        desc: &MediaDescriptor,
        cancel: &CancelToken,
    ) -> Result<ImageHandle, LoadError> {
        if cancel.is_cancelled() {
            return Err(LoadError::Aborted);
        }
        let image = image::ImageReader::open(&desc.path)
            .map_err(LoadError::failed)?
            .decode()
            .map_err(LoadError::failed)?;
        // The decode is the long pole; honor a cancel that raced it instead
        // of publishing a handle eviction already released.
        if cancel.is_cancelled() {
            return Err(LoadError::Aborted);
        }
        let rgba = image.to_rgba8();
        Ok(ImageHandle {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    fn open_video(&self, desc: &MediaDescriptor) -> Result<VideoStream, LoadError> {
        let metadata = std::fs::metadata(&desc.path).map_err(LoadError::failed)?;
        if !metadata.is_file() {
            return Err(LoadError::failed(format!(
                "not a regular file: {}",
                desc.path
            )));
        }
        let (tx, rx) = bounded(2);
        let _ = tx.send(VideoEvent::FirstFrame);
        let _ = tx.send(VideoEvent::CanPlayThrough);
        Ok(VideoStream {
            source: desc.path.clone(),
            events: rx,
            width: desc.known_width,
            height: desc.known_height,
        })
    }

    fn probe_kind(&self, desc: &MediaDescriptor) -> Result<MediaKind, LoadError> {
        let mut file = File::open(&desc.path).map_err(LoadError::failed)?;
        let mut header = [0u8; PROBE_BYTES];
        let read = read_up_to(&mut file, &mut header).map_err(LoadError::failed)?;
        let mime = tree_magic_mini::from_u8(&header[..read]);
        if mime.starts_with("video/") {
            return Ok(MediaKind::Video);
        }
        if mime.starts_with("image/") {
            return Ok(MediaKind::Image);
        }
        kind_for_path(Path::new(&desc.path))
            .ok_or_else(|| LoadError::failed(format!("unknown media type: {mime}")))
    }
}
