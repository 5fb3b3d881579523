#![forbid(unsafe_code)]

//! Timer-driven host for [`SurfaceWatcher`].
//!
//! The state machine decides; this module probes the document, arms `gloo`
//! timeouts, and attaches whatever the winning probe found.

use std::cell::RefCell;
use std::rc::Rc;

use gloo::timers::callback::Timeout;
use wasm_bindgen::JsCast;
use web_sys::Element;
use zoompan_core::{SurfaceWatcher, WatchAction, WatchActionKind, WatchEvent, WatchState, ZoomConfig};

use crate::surface::{self, ATTACHED_ATTR};

pub(crate) struct WatchInner {
    config: ZoomConfig,
    machine: RefCell<SurfaceWatcher>,
    timer: RefCell<Option<Timeout>>,
    /// Surfaces found by the last probe, waiting for `AttachSurfaces`.
    pending: RefCell<Vec<Element>>,
    origin_ms: f64,
}

impl WatchInner {
    pub(crate) fn new(config: ZoomConfig) -> Rc<Self> {
        let machine = SurfaceWatcher::new(config.watch());
        Rc::new(Self {
            config,
            machine: RefCell::new(machine),
            timer: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            origin_ms: js_sys::Date::now(),
        })
    }

    fn now_ms(&self) -> u64 {
        let elapsed = js_sys::Date::now() - self.origin_ms;
        if elapsed.is_finite() && elapsed > 0.0 {
            elapsed as u64
        } else {
            0
        }
    }

    pub(crate) fn start(self: &Rc<Self>) {
        let now = self.now_ms();
        self.step(now, WatchEvent::Start);
    }

    pub(crate) fn cancel(&self) {
        let now = self.now_ms();
        let _ = self.machine.borrow_mut().handle_event(now, WatchEvent::Cancel);
        self.timer.borrow_mut().take();
        self.pending.borrow_mut().clear();
    }

    pub(crate) fn state(&self) -> WatchState {
        self.machine.borrow().state()
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.machine.borrow().snapshot().attempt
    }

    pub(crate) fn drain_transition_jsonl(&self, run_id: &str) -> Vec<String> {
        self.machine.borrow_mut().drain_transition_jsonl(run_id)
    }

    /// Feed `event` and run the resulting actions until the machine waits.
    fn step(self: &Rc<Self>, now_ms: u64, event: WatchEvent) {
        let mut queue = vec![(now_ms, event)];
        while let Some((now, event)) = queue.pop() {
            let transition = self.machine.borrow_mut().handle_event(now, event);
            for action in transition.actions {
                if let Some(next) = self.run_action(now, &action) {
                    queue.push((now, next));
                }
            }
        }
    }

    fn run_action(self: &Rc<Self>, now_ms: u64, action: &WatchAction) -> Option<WatchEvent> {
        match action.kind {
            WatchActionKind::Probe => {
                let ready = self.probe();
                let count = ready.len();
                *self.pending.borrow_mut() = ready;
                Some(WatchEvent::ProbeResult { ready: count })
            }
            WatchActionKind::ScheduleRetry => {
                let deadline = action.deadline_ms.unwrap_or(now_ms);
                let delay = u32::try_from(deadline.saturating_sub(now_ms)).unwrap_or(u32::MAX);
                let inner = Rc::clone(self);
                let timeout = Timeout::new(delay, move || {
                    inner.timer.borrow_mut().take();
                    // Clock granularity can land a hair before the deadline.
                    let now = inner.now_ms().max(deadline);
                    inner.step(now, WatchEvent::Tick);
                });
                *self.timer.borrow_mut() = Some(timeout);
                None
            }
            WatchActionKind::AttachSurfaces => {
                let surfaces = std::mem::take(&mut *self.pending.borrow_mut());
                for element in surfaces {
                    match surface::attach_surface(element, &self.config) {
                        Ok(attached) => {
                            surface::register(attached);
                        }
                        Err(err) => tracing::warn!(error = %err, "skipping diagram surface"),
                    }
                }
                None
            }
        }
    }

    /// Marker-matching surfaces that contain drawn graphics and are not yet
    /// attached.
    fn probe(&self) -> Vec<Element> {
        let Some(document) = web_sys::window().and_then(|window| window.document()) else {
            return Vec::new();
        };
        let nodes = match document.query_selector_all(&self.config.surface_selector) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::warn!(selector = %self.config.surface_selector, error = ?err, "invalid surface selector");
                return Vec::new();
            }
        };

        let mut ready = Vec::new();
        for idx in 0..nodes.length() {
            let Some(element) = nodes.item(idx).and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            if element.has_attribute(ATTACHED_ATTR) {
                continue;
            }
            let has_graphics = element
                .query_selector(&self.config.graphics_selector)
                .ok()
                .flatten()
                .is_some();
            if has_graphics {
                ready.push(element);
            }
        }
        ready
    }
}
