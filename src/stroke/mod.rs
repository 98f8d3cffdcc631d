//! Stroke engine.
//!
//! A `Stroke` turns an ordered list of world-space points plus a `StrokeStyle` into:
//! - a quad-per-segment vertex buffer (`geometry::StrokeGeometry`)
//! - an optional dash lookup table (`dash::DashAtlas`)
//! - per-frame shading parameters (`coverage::StrokeParams`)
//!
//! The shading stage (`coverage` on the CPU, `render/shaders/stroke.wgsl` on the GPU) combines
//! the three into pixel coverage with round joins, rounded dashes, trimming and an optional
//! arrowhead, at a width that stays constant in screen pixels.
//!
//! Per frame, after the `RenderContext` has been refreshed:
//! ```ignore
//! stroke.update(dt, &ctx);
//! ```

pub mod coverage;
pub mod dash;
pub mod geometry;
pub mod raster;
pub mod style;

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;

use crate::render::viewport::{FrameState, RenderContext};
use crate::scene::Aabb3;

pub use coverage::{DiscardReason, StrokeParams, Verdict};
pub use dash::{DashAtlas, DashKind, DashRow};
pub use geometry::{GeometryOptions, StrokeGeometry};
pub use raster::CoverageMask;
pub use style::{ArrowStyle, StrokeStyle, StyleUpdate};

/// Errors produced by the stroke engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StrokeError {
    #[error("a stroke needs at least 2 distinct points, got {count} point(s)")]
    Construction { count: usize },

    #[error("dash pattern must be an even number of non-negative runs with a positive sum, got {pattern:?}")]
    Pattern { pattern: Vec<f32> },

    #[error("proportions must satisfy 0 <= start <= end <= 1, got start={start} end={end}")]
    Proportion { start: f32, end: f32 },

    #[error("{what} index {index} out of range (len {len})")]
    Lookup {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

/// Process-unique stroke identity, used to key device-side resources.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeId(u64);

impl StrokeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct Stroke {
    id: StrokeId,
    style: StrokeStyle,
    geometry: StrokeGeometry,
    dash_atlas: Option<DashAtlas>,
    /// Animated dash phase, wrapped into the dash cycle.
    dash_phase: f32,
    frame: FrameState,
    params: StrokeParams,
    disposed: bool,
}

impl Stroke {
    pub fn new(
        points: &[Vec3],
        style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, StrokeError> {
        style.validate()?;
        let dash_atlas = build_atlas(&style)?;
        let geometry = StrokeGeometry::build(points, geometry_options(&style))?;
        let frame = ctx.frame();
        let params = StrokeParams::new(&style, &geometry, 0.0, frame);

        Ok(Self {
            id: StrokeId::next(),
            style,
            geometry,
            dash_atlas,
            dash_phase: 0.0,
            frame,
            params,
            disposed: false,
        })
    }

    /// Advance the dash phase and re-read the frame state.
    ///
    /// `ctx` must already reflect this frame's viewport and camera.
    pub fn update(&mut self, dt: f32, ctx: &RenderContext) {
        if self.disposed {
            return;
        }

        let cycle = self.dash_cycle();
        if cycle > 0.0 && cycle.is_finite() {
            self.dash_phase = (self.dash_phase + dt * self.style.dash_speed).rem_euclid(cycle);
        }

        self.frame = ctx.frame();
        self.refresh_params();
    }

    /// Apply a partial style.
    ///
    /// Geometry is not rebuilt, except that:
    /// - toggling the arrow reallocates (segment count changes)
    /// - changing proportions while an arrow is configured moves the arrow tip
    ///
    /// A new dash pattern rebuilds the dash atlas. On error nothing changes. Disposed strokes
    /// ignore restyles.
    pub fn restyle(&mut self, update: StyleUpdate) -> Result<(), StrokeError> {
        if self.disposed || update.is_empty() {
            return Ok(());
        }

        let style = update.applied_to(&self.style);
        style.validate()?;

        let atlas = match &update.dash_pattern {
            Some(_) => Some(build_atlas(&style)?),
            None => None,
        };

        if update.arrow.is_some() {
            self.geometry
                .set_arrow(style.arrow, style.end_proportion)?;
        } else if style.arrow.is_some() && update.touches_proportions() {
            self.geometry.place_arrow(style.end_proportion);
        }

        if let Some(atlas) = atlas {
            self.dash_atlas = atlas;
        }
        self.style = style;

        let cycle = self.dash_cycle();
        self.dash_phase = if cycle > 0.0 && cycle.is_finite() {
            self.dash_phase.rem_euclid(cycle)
        } else {
            0.0
        };

        self.refresh_params();
        Ok(())
    }

    /// Whether `restyle(update)` would succeed, without changing anything.
    pub fn check_restyle(&self, update: &StyleUpdate) -> Result<(), StrokeError> {
        if self.disposed || update.is_empty() {
            return Ok(());
        }
        let style = update.applied_to(&self.style);
        style.validate()?;
        if update.dash_pattern.is_some() {
            build_atlas(&style)?;
        }
        Ok(())
    }

    /// Replace the points; see `StrokeGeometry::update` for the reallocation rule. Disposed
    /// strokes keep their last points.
    pub fn set_points(&mut self, points: &[Vec3]) -> Result<(), StrokeError> {
        if self.disposed {
            return Ok(());
        }
        self.geometry.update(points)?;
        self.refresh_params();
        Ok(())
    }

    /// Release what this stroke holds. Device-side resources keyed by `id()` must be released by
    /// their owner (`StrokeRenderer::release`).
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::debug!("stroke {:?}: disposed", self.id);
        self.dash_atlas = None;
        self.disposed = true;
    }

    fn refresh_params(&mut self) {
        self.params = StrokeParams::new(&self.style, &self.geometry, self.dash_phase, self.frame);
    }

    /// Length of one dash cycle in world units, or 0 for solid strokes.
    fn dash_cycle(&self) -> f32 {
        self.dash_atlas
            .as_ref()
            .map_or(0.0, |atlas| atlas.period() * self.style.dash_scale)
    }

    #[inline]
    pub fn id(&self) -> StrokeId {
        self.id
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        self.geometry.points()
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.geometry.length()
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.geometry.num_points()
    }

    #[inline]
    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    #[inline]
    pub fn geometry(&self) -> &StrokeGeometry {
        &self.geometry
    }

    #[inline]
    pub fn dash_atlas(&self) -> Option<&DashAtlas> {
        self.dash_atlas.as_ref()
    }

    #[inline]
    pub fn dash_phase(&self) -> f32 {
        self.dash_phase
    }

    #[inline]
    pub fn params(&self) -> &StrokeParams {
        &self.params
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub fn compute_bounds(&self) -> Aabb3 {
        self.geometry.compute_bounds()
    }
}

fn build_atlas(style: &StrokeStyle) -> Result<Option<DashAtlas>, StrokeError> {
    style
        .dash_pattern
        .as_deref()
        .map(DashAtlas::build)
        .transpose()
}

fn geometry_options(style: &StrokeStyle) -> GeometryOptions {
    GeometryOptions {
        arrow: style.arrow,
        arrow_proportion: style.end_proportion,
        three_dimensional: style.three_dimensional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::viewport::ViewportConfig;
    use glam::Vec2;
    use std::sync::Arc;

    fn ctx() -> RenderContext {
        RenderContext::new(ViewportConfig::default(), Vec2::new(800.0, 800.0), 1.0)
    }

    fn corner() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn end_to_end_corner() {
        let stroke = Stroke::new(&corner(), StrokeStyle::default().with_width(1.0), &ctx()).unwrap();
        assert_eq!(stroke.num_points(), 3);
        assert!((stroke.length() - 2.0).abs() < 1e-6);
        assert_eq!(stroke.geometry().num_real_segments(), 2);
        assert_eq!(stroke.geometry().num_vertices(), 2 * 4);
        // 800px / 8 units => 100px per unit; width 1 => 50px half width.
        assert_eq!(stroke.params().half_width_px, 50.0);
    }

    #[test]
    fn construction_errors() {
        assert!(matches!(
            Stroke::new(&[Vec3::ZERO], StrokeStyle::default(), &ctx()),
            Err(StrokeError::Construction { count: 1 })
        ));
        assert!(matches!(
            Stroke::new(&corner(), StrokeStyle::default().with_dash(vec![1.0, 1.0, 1.0]), &ctx()),
            Err(StrokeError::Pattern { .. })
        ));
        assert!(matches!(
            Stroke::new(&corner(), StrokeStyle::default().with_proportions(0.8, 0.2), &ctx()),
            Err(StrokeError::Proportion { .. })
        ));
    }

    #[test]
    fn dash_phase_advances_and_wraps() {
        let style = StrokeStyle::default()
            .with_dash(vec![0.5, 0.5])
            .with_dash_speed(0.75);
        let mut stroke = Stroke::new(&corner(), style, &ctx()).unwrap();
        stroke.update(1.0, &ctx());
        assert!((stroke.dash_phase() - 0.75).abs() < 1e-6);
        stroke.update(1.0, &ctx());
        assert!((stroke.dash_phase() - 0.5).abs() < 1e-6);
        assert_eq!(stroke.params().dash.map(|d| d.phase), Some(stroke.dash_phase()));
    }

    #[test]
    fn solid_strokes_keep_zero_phase() {
        let mut stroke = Stroke::new(
            &corner(),
            StrokeStyle::default().with_dash_speed(3.0),
            &ctx(),
        )
        .unwrap();
        stroke.update(0.5, &ctx());
        assert_eq!(stroke.dash_phase(), 0.0);
        assert!(stroke.params().dash.is_none());
    }

    #[test]
    fn update_rereads_viewport() {
        let mut context = ctx();
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default().with_width(0.08), &context).unwrap();
        assert!((stroke.params().half_width_px - 4.0).abs() < 1e-5);

        context.resize(Vec2::new(800.0, 400.0));
        stroke.update(0.0, &context);
        assert!((stroke.params().half_width_px - 2.0).abs() < 1e-5);
        assert_eq!(stroke.params().frame.viewport_size, Vec2::new(800.0, 400.0));
    }

    #[test]
    fn restyle_proportions_moves_arrow() {
        let style = StrokeStyle::default().with_arrow(ArrowStyle::default());
        let mut stroke = Stroke::new(&corner(), style, &ctx()).unwrap();
        let tip = stroke.geometry().arrow().unwrap().tip;
        assert!((tip - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);

        let indices = Arc::clone(stroke.geometry().indices());
        stroke
            .restyle(StyleUpdate {
                end_proportion: Some(0.5),
                ..Default::default()
            })
            .unwrap();
        let tip = stroke.geometry().arrow().unwrap().tip;
        assert!((tip - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        assert!(Arc::ptr_eq(&indices, stroke.geometry().indices()));
    }

    #[test]
    fn restyle_without_geometry_fields_keeps_buffers() {
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx()).unwrap();
        let positions = stroke.geometry().positions().to_vec();
        let indices = Arc::clone(stroke.geometry().indices());
        stroke
            .restyle(StyleUpdate {
                width: Some(0.2),
                opacity: Some(0.5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stroke.geometry().positions(), positions.as_slice());
        assert!(Arc::ptr_eq(&indices, stroke.geometry().indices()));
        assert_eq!(stroke.params().color[3], 0.5);
    }

    #[test]
    fn failed_restyle_changes_nothing() {
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx()).unwrap();
        let err = stroke.restyle(StyleUpdate {
            start_proportion: Some(0.9),
            end_proportion: Some(0.1),
            width: Some(3.0),
            ..Default::default()
        });
        assert!(matches!(err, Err(StrokeError::Proportion { .. })));
        assert_eq!(stroke.style(), &StrokeStyle::default());

        let err = stroke.restyle(StyleUpdate {
            dash_pattern: Some(Some(vec![1.0])),
            ..Default::default()
        });
        assert!(matches!(err, Err(StrokeError::Pattern { .. })));
        assert!(stroke.dash_atlas().is_none());
    }

    #[test]
    fn restyle_dash_pattern_rebuilds_atlas() {
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx()).unwrap();
        stroke
            .restyle(StyleUpdate {
                dash_pattern: Some(Some(vec![2.0, 1.0, 1.0, 2.0])),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stroke.dash_atlas().map(DashAtlas::period), Some(6.0));

        stroke
            .restyle(StyleUpdate {
                dash_pattern: Some(None),
                ..Default::default()
            })
            .unwrap();
        assert!(stroke.dash_atlas().is_none());
    }

    #[test]
    fn set_points_reallocates_only_on_count_change() {
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx()).unwrap();
        let indices = Arc::clone(stroke.geometry().indices());

        stroke
            .set_points(&[Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 4.0, 0.0)])
            .unwrap();
        assert!(Arc::ptr_eq(&indices, stroke.geometry().indices()));
        assert_eq!(stroke.length(), 7.0);
        assert_eq!(stroke.params().total_length, 7.0);

        stroke.set_points(&[Vec3::ZERO, Vec3::X]).unwrap();
        assert!(!Arc::ptr_eq(&indices, stroke.geometry().indices()));
        assert_eq!(stroke.num_points(), 2);
    }

    #[test]
    fn dispose_is_idempotent_and_stops_updates() {
        let mut stroke = Stroke::new(
            &corner(),
            StrokeStyle::default().with_dash(vec![1.0, 1.0]).with_dash_speed(1.0),
            &ctx(),
        )
        .unwrap();
        stroke.dispose();
        stroke.dispose();
        assert!(stroke.is_disposed());
        assert!(stroke.dash_atlas().is_none());
        stroke.update(0.5, &ctx());
        assert_eq!(stroke.dash_phase(), 0.0);
    }

    #[test]
    fn disposed_strokes_ignore_restyle_and_new_points() {
        let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx()).unwrap();
        stroke.dispose();

        stroke
            .restyle(StyleUpdate {
                dash_pattern: Some(Some(vec![0.5, 0.5])),
                width: Some(0.3),
                ..Default::default()
            })
            .unwrap();
        assert!(stroke.dash_atlas().is_none());
        assert_eq!(stroke.style().width, StrokeStyle::default().width);

        stroke.set_points(&[Vec3::ZERO, Vec3::Y]).unwrap();
        assert_eq!(stroke.points(), &corner()[..]);
    }
}
