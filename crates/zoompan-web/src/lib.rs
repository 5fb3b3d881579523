#![forbid(unsafe_code)]

//! WASM frontend that gives rendered diagram SVGs wheel zoom and drag pan.
//!
//! The interaction logic lives in `zoompan-core`; this crate binds it to the
//! DOM:
//!
//! - `wasm` (wasm32 only): `wasm-bindgen` exports (`watch`, `attach`,
//!   handles) and the module start hook that auto-watches the document.
//! - `surface` (wasm32 only): listeners, gesture sessions, style writes.
//! - `watch` (wasm32 only): timer-driven readiness polling.
//! - [`logging`]: `tracing` subscriber that writes to the browser console.

pub mod logging;

#[cfg(target_arch = "wasm32")]
mod surface;
#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
mod watch;

#[cfg(target_arch = "wasm32")]
pub use surface::AttachError;
#[cfg(target_arch = "wasm32")]
pub use wasm::{WatchHandle, ZoomHandle, attach, watch};

pub use zoompan_core::{ConfigError, ViewportTransform, ZoomConfig};
