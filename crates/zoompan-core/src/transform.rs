#![forbid(unsafe_code)]

//! Viewport transform and its CSS serialization.
//!
//! The transform string must read exactly the way a JS host would build it
//! with a template literal, so numbers go through `ryu-js` instead of Rust's
//! float `Display` (`1` rather than `1.0`, `0` rather than `-0`).

use serde::Serialize;

/// Translate + uniform scale applied to a diagram surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportTransform {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
}

impl ViewportTransform {
    /// The identity transform: no pan, unit scale.
    pub const IDENTITY: Self = Self {
        pan_x: 0.0,
        pan_y: 0.0,
        scale: 1.0,
    };

    #[must_use]
    pub const fn new(pan_x: f64, pan_y: f64, scale: f64) -> Self {
        Self {
            pan_x,
            pan_y,
            scale,
        }
    }

    /// `translate(<panX>px,<panY>px) scale(<scale>)`.
    #[must_use]
    pub fn to_css(&self) -> String {
        let mut out = String::with_capacity(48);
        self.write_css(&mut out);
        out
    }

    /// Append the CSS transform to `out` without allocating a new string.
    pub fn write_css(&self, out: &mut String) {
        let mut buf = ryu_js::Buffer::new();
        out.push_str("translate(");
        out.push_str(js_number_to_string(self.pan_x, &mut buf));
        out.push_str("px,");
        out.push_str(js_number_to_string(self.pan_y, &mut buf));
        out.push_str("px) scale(");
        out.push_str(js_number_to_string(self.scale, &mut buf));
        out.push(')');
    }
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl core::fmt::Display for ViewportTransform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Stringify a number the way `String(n)` does in JS.
///
/// `ryu_js::Buffer::format` already covers `NaN`/`Infinity`; `-0` needs the
/// explicit fold because JS prints it as `0`.
fn js_number_to_string(mut v: f64, buf: &mut ryu_js::Buffer) -> &str {
    if v == 0.0 {
        v = 0.0;
    }
    buf.format(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_serializes_without_fraction_digits() {
        assert_eq!(
            ViewportTransform::IDENTITY.to_css(),
            "translate(0px,0px) scale(1)"
        );
    }

    #[test]
    fn one_zoom_out_step_prints_point_nine() {
        let t = ViewportTransform::new(0.0, 0.0, 1.0 * 0.9);
        assert_eq!(t.to_css(), "translate(0px,0px) scale(0.9)");
    }

    #[test]
    fn negative_zero_prints_as_zero() {
        let t = ViewportTransform::new(-0.0, -0.0, 1.0);
        assert_eq!(t.to_css(), "translate(0px,0px) scale(1)");
    }

    #[test]
    fn fractional_and_negative_pan() {
        let t = ViewportTransform::new(-12.5, 7.25, 1.1);
        assert_eq!(t.to_css(), "translate(-12.5px,7.25px) scale(1.1)");
    }

    #[test]
    fn compounded_scale_uses_shortest_round_trip_digits() {
        // 1.1 * 1.1 is 1.2100000000000002 in binary64, as JS prints it.
        let t = ViewportTransform::new(0.0, 0.0, 1.1 * 1.1);
        assert_eq!(t.to_css(), "translate(0px,0px) scale(1.2100000000000002)");
    }

    #[test]
    fn tiny_scale_uses_js_exponent_form() {
        let t = ViewportTransform::new(0.0, 0.0, 1e-7);
        assert_eq!(t.to_css(), "translate(0px,0px) scale(1e-7)");
    }

    #[test]
    fn display_matches_to_css() {
        let t = ViewportTransform::new(5.0, 10.0, 2.0);
        assert_eq!(t.to_string(), t.to_css());
    }

    #[test]
    fn write_css_appends() {
        let mut out = String::from("x:");
        ViewportTransform::IDENTITY.write_css(&mut out);
        assert_eq!(out, "x:translate(0px,0px) scale(1)");
    }
}
