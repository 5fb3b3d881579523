#![forbid(unsafe_code)]

//! Host-supplied configuration.
//!
//! Every field has a default, so an empty options object (or none at all)
//! reproduces the stock behavior: 0.9/1.1 zoom steps, `svg.mermaid-js`
//! surfaces, 30 retries spaced 200 ms apart.

use serde::{Deserialize, Serialize};

use crate::viewport::ViewportConfig;
use crate::watcher::WatchConfig;

/// Default marker selector produced by the diagram renderer.
pub const DEFAULT_SURFACE_SELECTOR: &str = "svg.mermaid-js";
/// Child nodes whose presence means the renderer has finished drawing.
pub const DEFAULT_GRAPHICS_SELECTOR: &str = "g, path, text";
/// Class added to the surface's parent so a stylesheet can clip and style it.
pub const DEFAULT_CONTAINER_CLASS: &str = "zoom-container";

/// Affordance sheet for a container class; injected only on request.
///
/// `class` must be a plain class name, as produced by
/// [`ZoomConfig::container_class`].
#[must_use]
pub fn container_css(class: &str) -> String {
    format!(
        ".{class} {{ overflow: hidden; position: relative; }}\n\
         .{class} > svg {{ cursor: grab; user-select: none; }}\n"
    )
}

/// Errors from building or validating a [`ZoomConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Options were not valid JSON or had a field of the wrong type.
    Json(String),
    /// A zoom factor was zero, negative, or not finite.
    InvalidFactor { field: &'static str, value: f64 },
    /// A scale bound was zero, negative, or not finite.
    InvalidScaleBound { field: &'static str, value: f64 },
    /// `minScale` is larger than `maxScale`.
    InvertedScaleBounds { min: f64, max: f64 },
    /// The poll interval must be at least one millisecond.
    ZeroInterval,
    /// A selector or class name was blank.
    EmptyField(&'static str),
    /// `containerClass` holds characters other than ASCII letters, digits, `-` and `_`.
    InvalidClassName(String),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "options JSON error: {msg}"),
            Self::InvalidFactor { field, value } => {
                write!(f, "{field} must be a positive finite number, got {value}")
            }
            Self::InvalidScaleBound { field, value } => {
                write!(f, "{field} must be a positive finite number, got {value}")
            }
            Self::InvertedScaleBounds { min, max } => {
                write!(f, "minScale ({min}) exceeds maxScale ({max})")
            }
            Self::ZeroInterval => f.write_str("pollIntervalMs must be at least 1"),
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::InvalidClassName(class) => {
                write!(f, "containerClass must be a single class name, got {class:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Full configuration for one watcher or attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoomConfig {
    /// Scale multiplier applied when scrolling up/back.
    pub zoom_in_factor: f64,
    /// Scale multiplier applied when scrolling down/forward.
    pub zoom_out_factor: f64,
    /// Lower scale bound. Unbounded when absent.
    pub min_scale: Option<f64>,
    /// Upper scale bound. Unbounded when absent.
    pub max_scale: Option<f64>,
    pub surface_selector: String,
    pub graphics_selector: String,
    pub container_class: String,
    /// Retries after the first probe before the watcher gives up.
    pub max_attempts: u32,
    pub poll_interval_ms: u32,
    /// Inject [`container_css`] for `container_class` into the document head once.
    pub inject_styles: bool,
    /// `tracing` level name (`error`..`trace`, or `off`).
    pub log_level: String,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            zoom_in_factor: 1.1,
            zoom_out_factor: 0.9,
            min_scale: None,
            max_scale: None,
            surface_selector: DEFAULT_SURFACE_SELECTOR.to_owned(),
            graphics_selector: DEFAULT_GRAPHICS_SELECTOR.to_owned(),
            container_class: DEFAULT_CONTAINER_CLASS.to_owned(),
            max_attempts: 30,
            poll_interval_ms: 200,
            inject_styles: false,
            log_level: "warn".to_owned(),
        }
    }
}

impl ZoomConfig {
    /// Parse a camelCase options object and validate it.
    ///
    /// An empty string, `null`, and `undefined` all yield the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let trimmed = json.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
            return Ok(Self::default());
        }
        let config: Self =
            serde_json::from_str(trimmed).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive_factor("zoomInFactor", self.zoom_in_factor)?;
        check_positive_factor("zoomOutFactor", self.zoom_out_factor)?;
        if let Some(min) = self.min_scale {
            check_scale_bound("minScale", min)?;
        }
        if let Some(max) = self.max_scale {
            check_scale_bound("maxScale", max)?;
        }
        if let (Some(min), Some(max)) = (self.min_scale, self.max_scale) {
            if min > max {
                return Err(ConfigError::InvertedScaleBounds { min, max });
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.surface_selector.trim().is_empty() {
            return Err(ConfigError::EmptyField("surfaceSelector"));
        }
        if self.graphics_selector.trim().is_empty() {
            return Err(ConfigError::EmptyField("graphicsSelector"));
        }
        if self.container_class.trim().is_empty() {
            return Err(ConfigError::EmptyField("containerClass"));
        }
        if !self
            .container_class
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidClassName(self.container_class.clone()));
        }
        Ok(())
    }

    #[must_use]
    pub fn viewport(&self) -> ViewportConfig {
        ViewportConfig {
            zoom_in_factor: self.zoom_in_factor,
            zoom_out_factor: self.zoom_out_factor,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            container_class: self.container_class.clone(),
        }
    }

    #[must_use]
    pub fn watch(&self) -> WatchConfig {
        WatchConfig {
            max_attempts: self.max_attempts,
            interval_ms: u64::from(self.poll_interval_ms),
        }
    }
}

fn check_positive_factor(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidFactor { field, value })
    }
}

fn check_scale_bound(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidScaleBound { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_and_null_options_yield_defaults() {
        for input in ["", "  ", "null", "undefined", "{}"] {
            assert_eq!(ZoomConfig::from_json(input), Ok(ZoomConfig::default()), "{input:?}");
        }
    }

    #[test]
    fn camel_case_fields_override_defaults() {
        let config = ZoomConfig::from_json(
            r#"{"zoomInFactor":1.25,"maxAttempts":5,"pollIntervalMs":50,"surfaceSelector":"svg.diagram","injectStyles":true}"#,
        )
        .expect("valid options");
        assert_eq!(config.zoom_in_factor, 1.25);
        assert_eq!(config.zoom_out_factor, 0.9);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.surface_selector, "svg.diagram");
        assert!(config.inject_styles);
        assert_eq!(config.graphics_selector, DEFAULT_GRAPHICS_SELECTOR);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = ZoomConfig::from_json(r#"{"zoomFactor":2}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        let err = ZoomConfig::from_json(r#"{"zoomOutFactor":0}"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidFactor {
                field: "zoomOutFactor",
                value: 0.0
            }
        );
        let err = ZoomConfig::from_json(r#"{"zoomInFactor":-1.1}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidFactor {
                field: "zoomInFactor",
                ..
            }
        ));
    }

    #[test]
    fn inverted_scale_bounds_are_rejected() {
        let err = ZoomConfig::from_json(r#"{"minScale":4,"maxScale":2}"#).unwrap_err();
        assert_eq!(err, ConfigError::InvertedScaleBounds { min: 4.0, max: 2.0 });
    }

    #[test]
    fn zero_interval_and_blank_selector_are_rejected() {
        assert_eq!(
            ZoomConfig::from_json(r#"{"pollIntervalMs":0}"#),
            Err(ConfigError::ZeroInterval)
        );
        assert_eq!(
            ZoomConfig::from_json(r#"{"surfaceSelector":"  "}"#),
            Err(ConfigError::EmptyField("surfaceSelector"))
        );
    }

    #[test]
    fn projections_carry_fields() {
        let config = ZoomConfig {
            max_attempts: 3,
            poll_interval_ms: 10,
            min_scale: Some(0.5),
            ..ZoomConfig::default()
        };
        assert_eq!(config.watch(), WatchConfig { max_attempts: 3, interval_ms: 10 });
        let viewport = config.viewport();
        assert_eq!(viewport.min_scale, Some(0.5));
        assert_eq!(viewport.max_scale, None);
        assert_eq!(viewport.container_class, DEFAULT_CONTAINER_CLASS);
    }

    #[test]
    fn container_css_targets_the_configured_class() {
        let css = container_css("zc");
        assert!(css.contains(".zc { overflow: hidden;"));
        assert!(css.contains(".zc > svg { cursor: grab;"));
        assert!(!css.contains("zoom-container"));
        assert!(container_css(DEFAULT_CONTAINER_CLASS).starts_with(".zoom-container {"));
    }

    #[test]
    fn container_class_must_be_one_plain_name() {
        let config = ZoomConfig::from_json(r#"{"containerClass":"diagram-frame"}"#)
            .expect("plain class");
        assert_eq!(config.container_class, "diagram-frame");
        assert_eq!(
            ZoomConfig::from_json(r#"{"containerClass":"a b"}"#),
            Err(ConfigError::InvalidClassName("a b".to_owned()))
        );
        assert!(matches!(
            ZoomConfig::from_json(r#"{"containerClass":"x{}"}"#),
            Err(ConfigError::InvalidClassName(_))
        ));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ConfigError::ZeroInterval.to_string(),
            "pollIntervalMs must be at least 1"
        );
        assert_eq!(
            ConfigError::EmptyField("containerClass").to_string(),
            "containerClass must not be empty"
        );
        assert!(ConfigError::Json("eof".into()).to_string().contains("eof"));
    }
}
