//! Stroke styling.
//!
//! `StrokeStyle` is the fully-resolved style a stroke is constructed with. Every field has a
//! default, so callers only spell out what they care about:
//!
//! ```ignore
//! let style = StrokeStyle::default()
//!     .with_width(0.06)
//!     .with_dash(vec![0.2, 0.1])
//!     .with_arrow(ArrowStyle::default());
//! ```
//!
//! `StyleUpdate` is the partial form used by `Stroke::restyle`; only the fields that are `Some`
//! are applied.

use crate::scene::Rgba;

use super::StrokeError;

/// Arrowhead drawn at the trimmed end of a stroke.
///
/// - `width`: base width in world units (converted to pixels like the stroke width).
/// - `length`: tip-to-base distance in world units, measured along the stroke.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArrowStyle {
    pub width: f32,
    pub length: f32,
    pub visible: bool,
}

impl Default for ArrowStyle {
    fn default() -> Self {
        Self {
            width: 0.2,
            length: 0.25,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    /// Stroke width in world units. The on-screen width only depends on the viewport,
    /// never on camera zoom.
    pub width: f32,
    pub color: Rgba,
    pub opacity: f32,

    /// Alternating on/off run lengths in world units. `None` draws a solid stroke.
    pub dash_pattern: Option<Vec<f32>>,
    /// Dash phase advance per second.
    pub dash_speed: f32,
    /// Static dash phase.
    pub dash_offset: f32,
    /// Multiplier applied to every run of `dash_pattern`.
    pub dash_scale: f32,

    pub start_proportion: f32,
    pub end_proportion: f32,

    pub arrow: Option<ArrowStyle>,
    pub three_dimensional: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 0.04,
            color: Rgba::WHITE,
            opacity: 1.0,
            dash_pattern: None,
            dash_speed: 0.0,
            dash_offset: 0.0,
            dash_scale: 1.0,
            start_proportion: 0.0,
            end_proportion: 1.0,
            arrow: None,
            three_dimensional: false,
        }
    }
}

impl StrokeStyle {
    #[inline]
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    #[inline]
    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    #[inline]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    #[inline]
    pub fn with_dash(mut self, pattern: Vec<f32>) -> Self {
        self.dash_pattern = Some(pattern);
        self
    }

    #[inline]
    pub fn with_dash_speed(mut self, speed: f32) -> Self {
        self.dash_speed = speed;
        self
    }

    #[inline]
    pub fn with_dash_offset(mut self, offset: f32) -> Self {
        self.dash_offset = offset;
        self
    }

    #[inline]
    pub fn with_proportions(mut self, start: f32, end: f32) -> Self {
        self.start_proportion = start;
        self.end_proportion = end;
        self
    }

    #[inline]
    pub fn with_arrow(mut self, arrow: ArrowStyle) -> Self {
        self.arrow = Some(arrow);
        self
    }

    #[inline]
    pub fn three_dimensional(mut self, enabled: bool) -> Self {
        self.three_dimensional = enabled;
        self
    }

    /// Color with `opacity` folded into alpha, as handed to the shading stage.
    #[inline]
    pub fn premultiplied_alpha_color(&self) -> [f32; 4] {
        let a = (self.color.a * self.opacity).clamp(0.0, 1.0);
        [self.color.r, self.color.g, self.color.b, a]
    }

    /// Checks the invariants that cannot be expressed in the type.
    ///
    /// Dash patterns are validated when the dash atlas is built.
    pub fn validate(&self) -> Result<(), StrokeError> {
        validate_proportions(self.start_proportion, self.end_proportion)
    }
}

/// `0 <= start <= end <= 1`.
pub fn validate_proportions(start: f32, end: f32) -> Result<(), StrokeError> {
    let in_unit = |p: f32| (0.0..=1.0).contains(&p);
    if in_unit(start) && in_unit(end) && start <= end {
        Ok(())
    } else {
        Err(StrokeError::Proportion { start, end })
    }
}

/// Partial style used by `Stroke::restyle`.
///
/// Nested options distinguish "leave unchanged" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleUpdate {
    pub width: Option<f32>,
    pub color: Option<Rgba>,
    pub opacity: Option<f32>,
    pub dash_pattern: Option<Option<Vec<f32>>>,
    pub dash_speed: Option<f32>,
    pub dash_offset: Option<f32>,
    pub dash_scale: Option<f32>,
    pub start_proportion: Option<f32>,
    pub end_proportion: Option<f32>,
    pub arrow: Option<Option<ArrowStyle>>,
}

impl StyleUpdate {
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[inline]
    pub fn touches_proportions(&self) -> bool {
        self.start_proportion.is_some() || self.end_proportion.is_some()
    }

    /// Produce the style that results from applying this update to `base`.
    ///
    /// `base` is left untouched so callers can validate before committing.
    pub fn applied_to(&self, base: &StrokeStyle) -> StrokeStyle {
        let mut style = base.clone();
        if let Some(width) = self.width {
            style.width = width;
        }
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(opacity) = self.opacity {
            style.opacity = opacity;
        }
        if let Some(pattern) = &self.dash_pattern {
            style.dash_pattern = pattern.clone();
        }
        if let Some(speed) = self.dash_speed {
            style.dash_speed = speed;
        }
        if let Some(offset) = self.dash_offset {
            style.dash_offset = offset;
        }
        if let Some(scale) = self.dash_scale {
            style.dash_scale = scale;
        }
        if let Some(start) = self.start_proportion {
            style.start_proportion = start;
        }
        if let Some(end) = self.end_proportion {
            style.end_proportion = end;
        }
        if let Some(arrow) = self.arrow {
            style.arrow = arrow;
        }
        style
    }

    /// Fold `other` on top of `self`; fields set in `other` win.
    pub fn merge(mut self, other: StyleUpdate) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            width,
            color,
            opacity,
            dash_pattern,
            dash_speed,
            dash_offset,
            dash_scale,
            start_proportion,
            end_proportion,
            arrow
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportions_must_be_ordered_and_in_unit_range() {
        assert!(validate_proportions(0.0, 1.0).is_ok());
        assert!(validate_proportions(0.5, 0.5).is_ok());
        assert!(matches!(
            validate_proportions(0.75, 0.25),
            Err(StrokeError::Proportion { .. })
        ));
        assert!(validate_proportions(-0.1, 0.5).is_err());
        assert!(validate_proportions(0.0, 1.5).is_err());
        assert!(validate_proportions(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn update_only_touches_named_fields() {
        let base = StrokeStyle::default().with_width(0.1).with_dash(vec![1.0, 1.0]);
        let update = StyleUpdate {
            end_proportion: Some(0.5),
            dash_pattern: Some(None),
            ..Default::default()
        };

        let style = update.applied_to(&base);
        assert_eq!(style.width, 0.1);
        assert_eq!(style.end_proportion, 0.5);
        assert_eq!(style.dash_pattern, None);
        assert!(update.touches_proportions());
        assert_eq!(base.dash_pattern, Some(vec![1.0, 1.0]));
    }

    #[test]
    fn merge_prefers_later_fields() {
        let a = StyleUpdate {
            width: Some(1.0),
            opacity: Some(0.5),
            ..Default::default()
        };
        let b = StyleUpdate {
            opacity: Some(0.25),
            ..Default::default()
        };
        let merged = a.merge(b);
        assert_eq!(merged.width, Some(1.0));
        assert_eq!(merged.opacity, Some(0.25));
        assert!(!merged.is_empty());
        assert!(StyleUpdate::default().is_empty());
    }
}
