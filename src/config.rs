use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "REELGRID";

/// Engine tuning knobs. Every field has a sensible default so an empty file
/// (or no file at all) yields a working engine; the video grace periods in
/// particular are heuristics, not contractual thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub preload: PreloadConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GestureConfig {
    /// Cumulative displacement before a pointer sequence counts as a drag.
    #[serde(default = "default_dead_zone_px")]
    pub dead_zone_px: f32,
    #[serde(default = "default_min_distance_px")]
    pub min_distance_px: f32,
    #[serde(default = "default_mid_distance_px")]
    pub mid_distance_px: f32,
    #[serde(default = "default_short_distance_px")]
    pub short_distance_px: f32,
    /// Velocities in px/ms against the smoothed estimate.
    #[serde(default = "default_high_velocity")]
    pub high_velocity: f32,
    #[serde(default = "default_mid_velocity")]
    pub mid_velocity: f32,
    /// Weight of the newest sample in the velocity estimate.
    #[serde(default = "default_velocity_smoothing")]
    pub velocity_smoothing: f32,
    #[serde(default = "default_short_time", with = "humantime_serde")]
    pub short_time: Duration,
    /// A single wheel event steps once when |delta| exceeds this.
    #[serde(default = "default_wheel_threshold")]
    pub wheel_threshold: f32,
    /// Quiet time before a scroll-snap container counts as settled.
    #[serde(default = "default_settle_debounce", with = "humantime_serde")]
    pub settle_debounce: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            dead_zone_px: default_dead_zone_px(),
            min_distance_px: default_min_distance_px(),
            mid_distance_px: default_mid_distance_px(),
            short_distance_px: default_short_distance_px(),
            high_velocity: default_high_velocity(),
            mid_velocity: default_mid_velocity(),
            velocity_smoothing: default_velocity_smoothing(),
            short_time: default_short_time(),
            wheel_threshold: default_wheel_threshold(),
            settle_debounce: default_settle_debounce(),
        }
    }
}

fn default_dead_zone_px() -> f32 {
    12.0
}

fn default_min_distance_px() -> f32 {
    50.0
}

fn default_mid_distance_px() -> f32 {
    80.0
}

fn default_short_distance_px() -> f32 {
    30.0
}

fn default_high_velocity() -> f32 {
    2.5
}

fn default_mid_velocity() -> f32 {
    1.2
}

fn default_velocity_smoothing() -> f32 {
    0.7
}

fn default_short_time() -> Duration {
    Duration::from_millis(180)
}

fn default_wheel_threshold() -> f32 {
    30.0
}

fn default_settle_debounce() -> Duration {
    Duration::from_millis(120)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreloadConfig {
    /// Cap on simultaneous in-flight loads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Half-width of the desired window around the current index.
    #[serde(default = "default_radius")]
    pub radius: usize,
    /// Grace after first-frame for high/medium priority video loads.
    #[serde(default = "default_priority_grace", with = "humantime_serde")]
    pub priority_grace: Duration,
    /// Grace after first-frame for opportunistic video loads.
    #[serde(default = "default_opportunistic_grace", with = "humantime_serde")]
    pub opportunistic_grace: Duration,
    /// Hard cap on waiting for any video readiness signal.
    #[serde(default = "default_video_wait_cap", with = "humantime_serde")]
    pub video_wait_cap: Duration,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            radius: default_radius(),
            priority_grace: default_priority_grace(),
            opportunistic_grace: default_opportunistic_grace(),
            video_wait_cap: default_video_wait_cap(),
        }
    }
}

fn default_workers() -> usize {
    3
}

fn default_radius() -> usize {
    2
}

fn default_priority_grace() -> Duration {
    Duration::from_millis(200)
}

fn default_opportunistic_grace() -> Duration {
    Duration::from_millis(500)
}

fn default_video_wait_cap() -> Duration {
    Duration::from_millis(1000)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// Rendered neighbors on each side of the current index (1 or 2).
    #[serde(default = "default_feed_buffer")]
    pub buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            buffer: default_feed_buffer(),
        }
    }
}

fn default_feed_buffer() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryConfig {
    #[serde(default = "default_min_column_width")]
    pub min_column_width: f32,
    #[serde(default = "default_max_column_width")]
    pub max_column_width: f32,
    /// Below this container width the narrow column minimum applies.
    #[serde(default = "default_narrow_breakpoint")]
    pub narrow_breakpoint: f32,
    #[serde(default = "default_narrow_min_column_width")]
    pub narrow_min_column_width: f32,
    #[serde(default = "default_gap")]
    pub gap: f32,
    /// Height/width fallback when neither known nor measured dimensions exist.
    #[serde(default = "default_aspect_ratio")]
    pub default_aspect_ratio: f32,
    /// Extra extent rendered above and below the visible scroll region.
    #[serde(default = "default_render_buffer_px")]
    pub render_buffer_px: f32,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            min_column_width: default_min_column_width(),
            max_column_width: default_max_column_width(),
            narrow_breakpoint: default_narrow_breakpoint(),
            narrow_min_column_width: default_narrow_min_column_width(),
            gap: default_gap(),
            default_aspect_ratio: default_aspect_ratio(),
            render_buffer_px: default_render_buffer_px(),
        }
    }
}

fn default_min_column_width() -> f32 {
    220.0
}

fn default_max_column_width() -> f32 {
    360.0
}

fn default_narrow_breakpoint() -> f32 {
    600.0
}

fn default_narrow_min_column_width() -> f32 {
    150.0
}

fn default_gap() -> f32 {
    8.0
}

fn default_aspect_ratio() -> f32 {
    1.25
}

fn default_render_buffer_px() -> f32 {
    400.0
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub path: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reelgrid").join("config.yaml"))
}

/// Load configuration from the YAML file (explicit path, else the default
/// location), then apply environment overrides. A missing file is not an
/// error; every field falls back to its default.
pub fn load(options: LoadOptions) -> Result<EngineConfig> {
    let path = options.path.or_else(default_path);
    let mut cfg = match path {
        Some(ref path) if path.exists() => read_config_file(path)?,
        _ => EngineConfig::default(),
    };
    let prefix = options
        .env_prefix
        .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string());
    apply_env_overrides(&mut cfg, &prefix);
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("config: failed to read file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("config: failed to parse file {}", path.display()))
}

fn apply_env_overrides(cfg: &mut EngineConfig, prefix: &str) {
    if let Some(workers) = env_parse::<usize>(prefix, "PRELOAD__WORKERS") {
        cfg.preload.workers = workers;
    }
    if let Some(radius) = env_parse::<usize>(prefix, "PRELOAD__RADIUS") {
        cfg.preload.radius = radius;
    }
    if let Some(buffer) = env_parse::<usize>(prefix, "FEED__BUFFER") {
        cfg.feed.buffer = buffer;
    }
    if let Some(threshold) = env_parse::<f32>(prefix, "GESTURE__WHEEL_THRESHOLD") {
        cfg.gesture.wheel_threshold = threshold;
    }
}

fn env_parse<T: std::str::FromStr>(prefix: &str, key: &str) -> Option<T> {
    env::var(format!("{prefix}_{key}"))
        .ok()
        .and_then(|val| val.trim().parse().ok())
}
