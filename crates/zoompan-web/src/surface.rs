#![forbid(unsafe_code)]

//! DOM side of a [`ViewportController`]: listeners in, style writes out.
//!
//! Wheel and mouse-down listen on the surface itself. Mouse-move and mouse-up
//! listen on the window, but only while a [`GestureSession`] is alive, so a
//! drag keeps tracking after the cursor leaves the surface and nothing stays
//! subscribed between drags.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CssStyleDeclaration, Element, Event, HtmlElement, MouseEvent, SvgElement, WheelEvent};
use zoompan_core::config::container_css;
use zoompan_core::{ViewportController, ViewportEffect, ViewportEvent, ZoomConfig};

/// Set on every attached surface; attaching twice is refused.
pub(crate) const ATTACHED_ATTR: &str = "data-zoompan";
const STYLE_MARKER_ATTR: &str = "data-zoompan-style";

/// Errors from wiring a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachError {
    /// The element is already under pan/zoom control.
    AlreadyAttached,
    /// The element has no parent to carry the container class.
    MissingParent,
    /// The element exposes no inline style (neither SVG nor HTML).
    NoStyle,
    /// A DOM call threw.
    Dom(String),
}

impl core::fmt::Display for AttachError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyAttached => f.write_str("element already has pan/zoom attached"),
            Self::MissingParent => f.write_str("element has no parent element"),
            Self::NoStyle => f.write_str("element has no inline style declaration"),
            Self::Dom(msg) => write!(f, "DOM error: {msg}"),
        }
    }
}

impl std::error::Error for AttachError {}

impl From<AttachError> for JsValue {
    fn from(err: AttachError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn dom_error(value: &JsValue) -> AttachError {
    AttachError::Dom(
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    )
}

/// Page-wide listeners that live exactly as long as one pan gesture.
struct GestureSession {
    _move: EventListener,
    _up: EventListener,
}

struct SurfaceInner {
    element: Element,
    style: CssStyleDeclaration,
    controller: RefCell<ViewportController>,
    session: RefCell<Option<GestureSession>>,
}

impl SurfaceInner {
    /// Feed one input event through the controller and apply its effects.
    fn dispatch(self: &Rc<Self>, event: ViewportEvent, dom_event: Option<&Event>) {
        let effects = self.controller.borrow_mut().handle_event(event);
        self.apply(effects, dom_event);
    }

    fn apply(self: &Rc<Self>, effects: Vec<ViewportEffect>, dom_event: Option<&Event>) {
        for effect in effects {
            if let Err(err) = self.apply_one(effect, dom_event) {
                tracing::warn!(error = %err, "pan/zoom effect failed");
            }
        }
    }

    fn apply_one(
        self: &Rc<Self>,
        effect: ViewportEffect,
        dom_event: Option<&Event>,
    ) -> Result<(), AttachError> {
        match effect {
            ViewportEffect::PreventDefault => {
                if let Some(event) = dom_event {
                    event.prevent_default();
                }
            }
            ViewportEffect::ApplyTransform(transform) => self
                .style
                .set_property("transform", &transform.to_css())
                .map_err(|e| dom_error(&e))?,
            ViewportEffect::SetCursor(cursor) => self
                .style
                .set_property("cursor", cursor.as_str())
                .map_err(|e| dom_error(&e))?,
            ViewportEffect::SetTransformOrigin(origin) => self
                .style
                .set_property("transform-origin", origin)
                .map_err(|e| dom_error(&e))?,
            ViewportEffect::AddContainerClass(class) => {
                let parent = self
                    .element
                    .parent_element()
                    .ok_or(AttachError::MissingParent)?;
                parent
                    .class_list()
                    .add_1(&class)
                    .map_err(|e| dom_error(&e))?;
            }
            ViewportEffect::BeginGesture => {
                let session = self.begin_gesture()?;
                *self.session.borrow_mut() = Some(session);
            }
            ViewportEffect::EndGesture => {
                // Dropping the session removes the window listeners. Release the
                // borrow before the drop runs.
                let session = self.session.borrow_mut().take();
                drop(session);
            }
        }
        Ok(())
    }

    fn begin_gesture(self: &Rc<Self>) -> Result<GestureSession, AttachError> {
        let window = web_sys::window().ok_or_else(|| AttachError::Dom("no window".to_owned()))?;

        let inner = Rc::clone(self);
        let on_move = EventListener::new(&window, "mousemove", move |event: &Event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            inner.dispatch(
                ViewportEvent::PointerMove {
                    x: f64::from(mouse.client_x()),
                    y: f64::from(mouse.client_y()),
                },
                Some(event),
            );
        });

        let inner = Rc::clone(self);
        let on_up = EventListener::new(&window, "mouseup", move |event: &Event| {
            inner.dispatch(ViewportEvent::PointerUp, Some(event));
        });

        Ok(GestureSession {
            _move: on_move,
            _up: on_up,
        })
    }
}

/// An attached surface. Dropping it removes every listener it installed.
pub(crate) struct ZoomSurface {
    inner: Rc<SurfaceInner>,
    _listeners: Vec<EventListener>,
}

impl ZoomSurface {
    pub(crate) fn reset(&self) {
        let effects = self.inner.controller.borrow_mut().reset();
        self.inner.apply(effects, None);
    }

    pub(crate) fn scale(&self) -> f64 {
        self.inner.controller.borrow().state().scale
    }

    pub(crate) fn is_panning(&self) -> bool {
        self.inner.controller.borrow().state().is_panning()
    }

    pub(crate) fn transform_css(&self) -> String {
        self.inner.controller.borrow().transform().to_css()
    }
}

impl Drop for ZoomSurface {
    fn drop(&mut self) {
        // A live gesture holds `Rc<SurfaceInner>` through its window listeners.
        let session = self.inner.session.borrow_mut().take();
        drop(session);
        let _ = self.inner.element.remove_attribute(ATTACHED_ATTR);
    }
}

fn style_of(element: &Element) -> Option<CssStyleDeclaration> {
    if let Some(svg) = element.dyn_ref::<SvgElement>() {
        return Some(svg.style());
    }
    element.dyn_ref::<HtmlElement>().map(HtmlElement::style)
}

/// Wire wheel zoom and drag pan onto `element`.
pub(crate) fn attach_surface(element: Element, config: &ZoomConfig) -> Result<ZoomSurface, AttachError> {
    if element.has_attribute(ATTACHED_ATTR) {
        return Err(AttachError::AlreadyAttached);
    }
    if element.parent_element().is_none() {
        return Err(AttachError::MissingParent);
    }
    let style = style_of(&element).ok_or(AttachError::NoStyle)?;

    if config.inject_styles {
        inject_container_styles(&config.container_class)?;
    }

    let inner = Rc::new(SurfaceInner {
        element: element.clone(),
        style,
        controller: RefCell::new(ViewportController::new(config.viewport())),
        session: RefCell::new(None),
    });

    let setup = inner.controller.borrow().attach();
    for effect in setup {
        inner.apply_one(effect, None)?;
    }

    let mut listeners = Vec::new();

    let handler = Rc::clone(&inner);
    listeners.push(EventListener::new_with_options(
        &element,
        "wheel",
        EventListenerOptions {
            phase: EventListenerPhase::Bubble,
            passive: false,
        },
        move |event: &Event| {
            let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
                return;
            };
            handler.dispatch(
                ViewportEvent::Wheel {
                    delta_y: wheel.delta_y(),
                },
                Some(event),
            );
        },
    ));

    let handler = Rc::clone(&inner);
    listeners.push(EventListener::new(&element, "mousedown", move |event: &Event| {
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        handler.dispatch(
            ViewportEvent::PointerDown {
                x: f64::from(mouse.client_x()),
                y: f64::from(mouse.client_y()),
            },
            Some(event),
        );
    }));

    element
        .set_attribute(ATTACHED_ATTR, "")
        .map_err(|e| dom_error(&e))?;

    tracing::debug!(
        id = %element.id(),
        class = %element.get_attribute("class").unwrap_or_default(),
        "pan/zoom attached"
    );

    Ok(ZoomSurface {
        inner,
        _listeners: listeners,
    })
}

/// Append [`container_css`] for `class` to `<head>` unless a sheet for that
/// class is already present.
fn inject_container_styles(class: &str) -> Result<(), AttachError> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| AttachError::Dom("no document".to_owned()))?;
    let marker = format!("style[{STYLE_MARKER_ATTR}=\"{class}\"]");
    if document
        .query_selector(&marker)
        .map_err(|e| dom_error(&e))?
        .is_some()
    {
        return Ok(());
    }
    let Some(head) = document.head() else {
        return Ok(());
    };
    let style = document
        .create_element("style")
        .map_err(|e| dom_error(&e))?;
    style
        .set_attribute(STYLE_MARKER_ATTR, class)
        .map_err(|e| dom_error(&e))?;
    style.set_text_content(Some(&container_css(class)));
    head.append_child(&style).map_err(|e| dom_error(&e))?;
    Ok(())
}

thread_local! {
    static SURFACES: RefCell<HashMap<u32, ZoomSurface>> = RefCell::new(HashMap::new());
    static NEXT_ID: Cell<u32> = const { Cell::new(1) };
}

/// Keep a surface alive for the page's lifetime; returns its registry id.
pub(crate) fn register(surface: ZoomSurface) -> u32 {
    let id = NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id.wrapping_add(1).max(1));
        id
    });
    SURFACES.with(|surfaces| {
        surfaces.borrow_mut().insert(id, surface);
    });
    id
}

/// Run `f` against a registered surface, if it still exists.
pub(crate) fn with_surface<R>(id: u32, f: impl FnOnce(&ZoomSurface) -> R) -> Option<R> {
    SURFACES.with(|surfaces| surfaces.borrow().get(&id).map(f))
}

/// Remove and drop a registered surface. Returns whether it existed.
pub(crate) fn unregister(id: u32) -> bool {
    let removed = SURFACES.with(|surfaces| surfaces.borrow_mut().remove(&id));
    removed.is_some()
}
