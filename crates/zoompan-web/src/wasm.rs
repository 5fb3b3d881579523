#![forbid(unsafe_code)]

//! `wasm-bindgen` exports.
//!
//! On module start the watcher runs automatically once the document has
//! parsed, using options from `window.zoompanOptions` when present. Setting
//! that global to `false` disables the automatic watcher; hosts can then call
//! [`watch`] or [`attach`] themselves.

use std::rc::Rc;

use gloo::events::EventListener;
use js_sys::{Array, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;
use zoompan_core::ZoomConfig;

use crate::logging;
use crate::surface;
use crate::watch::WatchInner;

const OPTIONS_GLOBAL: &str = "zoompanOptions";

fn console_error(msg: &str) {
    web_sys::console::error_1(&JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

/// Parse a JS options object (or `undefined`/`null`) into a validated config.
fn parse_options(options: &JsValue) -> Result<ZoomConfig, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(ZoomConfig::default());
    }
    let json = js_sys::JSON::stringify(options)?
        .as_string()
        .unwrap_or_default();
    ZoomConfig::from_json(&json).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn global_options() -> JsValue {
    web_sys::window()
        .and_then(|window| Reflect::get(&window, &JsValue::from_str(OPTIONS_GLOBAL)).ok())
        .unwrap_or(JsValue::UNDEFINED)
}

fn init_logging(config: &ZoomConfig) {
    let level = logging::parse_level(&config.log_level).unwrap_or_else(|| {
        console_error(&format!(
            "zoompan: unknown logLevel {:?}, using warn",
            config.log_level
        ));
        tracing::level_filters::LevelFilter::WARN
    });
    let _ = logging::init(level);
}

/// `readyState` is `"loading"` until the parser finishes and
/// `DOMContentLoaded` fires.
fn still_parsing(document: &web_sys::Document) -> bool {
    document.ready_state() == "loading"
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();

    let options = global_options();
    if options.as_bool() == Some(false) {
        let _ = logging::init(tracing::level_filters::LevelFilter::WARN);
        return;
    }
    let config = match parse_options(&options) {
        Ok(config) => config,
        Err(err) => {
            console_error(&format!(
                "zoompan: ignoring {OPTIONS_GLOBAL}: {}",
                err.as_string().unwrap_or_default()
            ));
            ZoomConfig::default()
        }
    };
    init_logging(&config);

    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    if still_parsing(&document) {
        EventListener::once(&document, "DOMContentLoaded", move |_| {
            WatchInner::new(config).start();
        })
        .forget();
    } else {
        WatchInner::new(config).start();
    }
}

/// Start a readiness watcher with the given options.
#[wasm_bindgen]
pub fn watch(options: JsValue) -> Result<WatchHandle, JsValue> {
    let config = parse_options(&options)?;
    let inner = WatchInner::new(config);
    inner.start();
    Ok(WatchHandle { inner })
}

/// Attach pan/zoom to one element directly, skipping the readiness poll.
#[wasm_bindgen]
pub fn attach(element: JsValue, options: JsValue) -> Result<ZoomHandle, JsValue> {
    let config = parse_options(&options)?;
    let element: Element = element
        .dyn_into()
        .map_err(|_| JsValue::from_str("attach expects a DOM element"))?;
    let surface = surface::attach_surface(element, &config)?;
    Ok(ZoomHandle {
        id: surface::register(surface),
    })
}

/// Handle to a running (or finished) readiness watcher.
#[wasm_bindgen]
pub struct WatchHandle {
    inner: Rc<WatchInner>,
}

#[wasm_bindgen]
impl WatchHandle {
    /// Stop polling. Surfaces already attached stay attached.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// One of `idle`, `probing`, `waiting`, `attached`, `exhausted`.
    pub fn state(&self) -> String {
        self.inner.state().as_str().to_owned()
    }

    pub fn attempt(&self) -> u32 {
        self.inner.attempt()
    }

    /// Drain watcher transitions as JSONL lines. Returns `Array<string>`.
    #[wasm_bindgen(js_name = drainTransitionJsonl)]
    pub fn drain_transition_jsonl(&self, run_id: &str) -> Array {
        let arr = Array::new();
        for line in self.inner.drain_transition_jsonl(run_id) {
            arr.push(&JsValue::from_str(&line));
        }
        arr
    }
}

/// Handle to an attached surface.
#[wasm_bindgen]
pub struct ZoomHandle {
    id: u32,
}

#[wasm_bindgen]
impl ZoomHandle {
    /// Return to the identity transform.
    pub fn reset(&self) -> Result<(), JsValue> {
        surface::with_surface(self.id, surface::ZoomSurface::reset)
            .ok_or_else(|| JsValue::from_str("surface detached"))
    }

    pub fn scale(&self) -> Option<f64> {
        surface::with_surface(self.id, surface::ZoomSurface::scale)
    }

    #[wasm_bindgen(js_name = isPanning)]
    pub fn is_panning(&self) -> bool {
        surface::with_surface(self.id, surface::ZoomSurface::is_panning).unwrap_or(false)
    }

    /// Current CSS transform string.
    pub fn transform(&self) -> Option<String> {
        surface::with_surface(self.id, surface::ZoomSurface::transform_css)
    }

    /// Remove all listeners. Returns `false` if already detached.
    pub fn detach(&self) -> bool {
        surface::unregister(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn parsed_document_starts_watching_immediately() {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .expect("document");
        assert!(matches!(
            document.ready_state().as_str(),
            "interactive" | "complete"
        ));
        assert!(!still_parsing(&document));
    }
}
