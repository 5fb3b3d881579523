#![forbid(unsafe_code)]

//! Platform-independent core for diagram pan/zoom.
//!
//! - [`viewport`]: wheel-zoom / drag-pan controller producing host effects.
//! - [`watcher`]: bounded fixed-interval readiness poll for rendered surfaces.
//! - [`transform`]: the translate+scale transform and its CSS string form.
//! - [`config`]: host options with defaults and validation.
//!
//! No JS/WASM types here; the `zoompan-web` crate maps effects and actions
//! onto the DOM.

pub mod config;
pub mod transform;
pub mod viewport;
pub mod watcher;

pub use config::{ConfigError, ZoomConfig};
pub use transform::ViewportTransform;
pub use viewport::{
    Cursor, PanGesture, ViewportConfig, ViewportController, ViewportEffect, ViewportEvent,
    ViewportState,
};
pub use watcher::{
    SurfaceWatcher, WatchAction, WatchActionKind, WatchConfig, WatchEvent, WatchSnapshot,
    WatchState, WatchTransition,
};
