#![allow(clippy::uninlined_format_args)]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod feed;
pub mod fetch;
pub mod gallery;
pub mod gesture;
pub mod local;
pub mod navigation;
pub mod preload;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use engine::{Engine, EngineOptions, SelectionMirror};
