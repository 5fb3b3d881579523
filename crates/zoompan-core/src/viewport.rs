#![forbid(unsafe_code)]

//! Wheel-zoom / drag-pan controller for a single diagram surface.
//!
//! The controller is host-driven: input events go in, [`ViewportEffect`]s come
//! out, and the host applies them to the DOM. Nothing here touches JS types,
//! so every interaction can be replayed natively.
//!
//! # Gesture lifecycle
//!
//! A pointer-down opens a [`PanGesture`] and emits
//! [`ViewportEffect::BeginGesture`]; the host subscribes to page-wide move/up
//! input only while that gesture is live. Pointer-up closes it with
//! [`ViewportEffect::EndGesture`], at which point the host drops the
//! subscription.

use serde::Serialize;

use crate::config::DEFAULT_CONTAINER_CLASS;
use crate::transform::ViewportTransform;

/// Transform origin written once at attach time so scaling pivots on the
/// surface's top-left corner.
pub const TRANSFORM_ORIGIN: &str = "0 0";

/// Zoom knobs for one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    /// Multiplier for scroll up/back (`delta_y <= 0`).
    pub zoom_in_factor: f64,
    /// Multiplier for scroll down/forward (`delta_y > 0`).
    pub zoom_out_factor: f64,
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
    /// Marker class added to the surface's parent.
    pub container_class: String,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_in_factor: 1.1,
            zoom_out_factor: 0.9,
            min_scale: None,
            max_scale: None,
            container_class: DEFAULT_CONTAINER_CLASS.to_owned(),
        }
    }
}

/// Cursor affordance shown on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Grab,
    Grabbing,
}

impl Cursor {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
        }
    }
}

/// An in-progress pan: the offset between the cursor and the pan origin at
/// pointer-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanGesture {
    pub anchor_x: f64,
    pub anchor_y: f64,
}

/// Mutable viewport state owned by one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    gesture: Option<PanGesture>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            gesture: None,
        }
    }
}

impl ViewportState {
    #[must_use]
    pub const fn is_panning(&self) -> bool {
        self.gesture.is_some()
    }

    #[must_use]
    pub fn drag_anchor(&self) -> Option<(f64, f64)> {
        self.gesture.map(|g| (g.anchor_x, g.anchor_y))
    }

    #[must_use]
    pub const fn transform(&self) -> ViewportTransform {
        ViewportTransform::new(self.pan_x, self.pan_y, self.scale)
    }
}

/// Input accepted by [`ViewportController::handle_event`].
///
/// Coordinates are viewport (client) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    Wheel { delta_y: f64 },
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
}

/// Side effects the host executes after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEffect {
    /// Suppress the browser default (page scroll) for the current event.
    PreventDefault,
    /// Write the transform to the surface's inline style.
    ApplyTransform(ViewportTransform),
    SetCursor(Cursor),
    /// Write `transform-origin` on the surface.
    SetTransformOrigin(&'static str),
    /// Add a marker class to the surface's parent.
    AddContainerClass(String),
    /// Start listening for page-wide move/up input.
    BeginGesture,
    /// Stop listening for page-wide move/up input.
    EndGesture,
}

/// Pan/zoom state machine for one surface.
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    state: ViewportState,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportController {
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            state: ViewportState::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ViewportState {
        &self.state
    }

    #[must_use]
    pub const fn transform(&self) -> ViewportTransform {
        self.state.transform()
    }

    #[must_use]
    pub const fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// One-time setup effects for a freshly attached surface.
    #[must_use]
    pub fn attach(&self) -> Vec<ViewportEffect> {
        vec![
            ViewportEffect::AddContainerClass(self.config.container_class.clone()),
            ViewportEffect::SetTransformOrigin(TRANSFORM_ORIGIN),
            ViewportEffect::SetCursor(Cursor::Grab),
        ]
    }

    pub fn handle_event(&mut self, event: ViewportEvent) -> Vec<ViewportEffect> {
        match event {
            ViewportEvent::Wheel { delta_y } => self.wheel(delta_y),
            ViewportEvent::PointerDown { x, y } => self.pointer_down(x, y),
            ViewportEvent::PointerMove { x, y } => self.pointer_move(x, y),
            ViewportEvent::PointerUp => self.pointer_up(),
        }
    }

    /// Zoom out on positive `delta_y`, in otherwise.
    pub fn wheel(&mut self, delta_y: f64) -> Vec<ViewportEffect> {
        let factor = if delta_y > 0.0 {
            self.config.zoom_out_factor
        } else {
            self.config.zoom_in_factor
        };
        self.state.scale = self.bounded_scale(self.state.scale * factor);

        #[cfg(feature = "tracing")]
        tracing::trace!(delta_y, scale = self.state.scale, "viewport wheel");

        vec![
            ViewportEffect::PreventDefault,
            ViewportEffect::ApplyTransform(self.state.transform()),
        ]
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Vec<ViewportEffect> {
        let was_panning = self.state.is_panning();
        self.state.gesture = Some(PanGesture {
            anchor_x: x - self.state.pan_x,
            anchor_y: y - self.state.pan_y,
        });

        #[cfg(feature = "tracing")]
        tracing::trace!(x, y, reanchor = was_panning, "pan gesture begin");

        let mut effects = vec![ViewportEffect::SetCursor(Cursor::Grabbing)];
        if !was_panning {
            effects.push(ViewportEffect::BeginGesture);
        }
        effects
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Vec<ViewportEffect> {
        let Some(gesture) = self.state.gesture else {
            return Vec::new();
        };
        self.state.pan_x = x - gesture.anchor_x;
        self.state.pan_y = y - gesture.anchor_y;
        vec![ViewportEffect::ApplyTransform(self.state.transform())]
    }

    /// End any active gesture. The idle cursor is restored unconditionally.
    pub fn pointer_up(&mut self) -> Vec<ViewportEffect> {
        let mut effects = vec![ViewportEffect::SetCursor(Cursor::Grab)];
        if self.state.gesture.take().is_some() {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                pan_x = self.state.pan_x,
                pan_y = self.state.pan_y,
                "pan gesture end"
            );
            effects.push(ViewportEffect::EndGesture);
        }
        effects
    }

    /// Return to the identity transform, cancelling any gesture.
    pub fn reset(&mut self) -> Vec<ViewportEffect> {
        let had_gesture = self.state.is_panning();
        self.state = ViewportState::default();
        let mut effects = vec![ViewportEffect::ApplyTransform(self.state.transform())];
        if had_gesture {
            effects.push(ViewportEffect::SetCursor(Cursor::Grab));
            effects.push(ViewportEffect::EndGesture);
        }
        effects
    }

    fn bounded_scale(&self, scale: f64) -> f64 {
        let mut scale = scale;
        if let Some(min) = self.config.min_scale {
            scale = scale.max(min);
        }
        if let Some(max) = self.config.max_scale {
            scale = scale.min(max);
        }
        scale
    }
}
