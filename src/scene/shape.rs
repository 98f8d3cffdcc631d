//! Shapes: a named stroke with an optional fill.

use glam::{Vec2, Vec3};

use crate::render::viewport::RenderContext;
use crate::stroke::{ArrowStyle, Stroke, StrokeError, StrokeStyle, StyleUpdate};

use super::fill::{self, FillError, FillMesh, TessellateOptions};
use super::{Aabb3, Rgba};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error(transparent)]
    Stroke(#[from] StrokeError),

    #[error(transparent)]
    Fill(#[from] FillError),
}

/// Interior of a closed shape.
///
/// The rendered alpha is `color.a * stroke opacity`, so fading a shape fades its fill too.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: Rgba,
    pub options: TessellateOptions,
    pub mesh: FillMesh,
}

#[derive(Debug)]
pub struct Shape {
    name: String,
    /// Painter's order; higher draws later.
    pub z: i32,
    stroke: Stroke,
    fill: Option<Fill>,
}

impl Shape {
    /// Open polyline through `points`.
    pub fn polyline(
        name: impl Into<String>,
        points: &[Vec3],
        style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, ShapeError> {
        Ok(Self {
            name: name.into(),
            z: 0,
            stroke: Stroke::new(points, style, ctx)?,
            fill: None,
        })
    }

    /// Closed polygon; the first point is repeated at the end so the stroke wraps.
    pub fn polygon(
        name: impl Into<String>,
        points: &[Vec3],
        style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, ShapeError> {
        let mut closed = points.to_vec();
        if let (Some(&first), Some(&last)) = (points.first(), points.last())
            && first != last
        {
            closed.push(first);
        }
        Self::polyline(name, &closed, style, ctx)
    }

    /// Axis-aligned rectangle on the z = 0 plane.
    pub fn rectangle(
        name: impl Into<String>,
        center: Vec2,
        size: Vec2,
        style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, ShapeError> {
        let h = size * 0.5;
        let corners = [
            Vec2::new(-h.x, -h.y),
            Vec2::new(h.x, -h.y),
            Vec2::new(h.x, h.y),
            Vec2::new(-h.x, h.y),
        ]
        .map(|c| (center + c).extend(0.0));
        Self::polygon(name, &corners, style, ctx)
    }

    /// Circle approximated by `segments` chords, starting at angle 0 and running CCW.
    pub fn circle(
        name: impl Into<String>,
        center: Vec2,
        radius: f32,
        segments: usize,
        style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, ShapeError> {
        let segments = segments.max(3);
        let points: Vec<Vec3> = (0..segments)
            .map(|i| {
                let a = std::f32::consts::TAU * i as f32 / segments as f32;
                (center + radius * Vec2::from_angle(a)).extend(0.0)
            })
            .collect();
        Self::polygon(name, &points, style, ctx)
    }

    /// Straight arrow from `from` to `to`. Uses the style's arrowhead, or the default one.
    pub fn arrow(
        name: impl Into<String>,
        from: Vec3,
        to: Vec3,
        mut style: StrokeStyle,
        ctx: &RenderContext,
    ) -> Result<Self, ShapeError> {
        style.arrow = Some(style.arrow.unwrap_or_default());
        Self::polyline(name, &[from, to], style, ctx)
    }

    /// Fill the outline with `color`.
    pub fn with_fill(mut self, color: Rgba, options: TessellateOptions) -> Result<Self, ShapeError> {
        let mesh = fill::tessellate_outline(self.stroke.points(), options)?;
        self.fill = Some(Fill {
            color,
            options,
            mesh,
        });
        Ok(self)
    }

    #[inline]
    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn update(&mut self, dt: f32, ctx: &RenderContext) {
        self.stroke.update(dt, ctx);
    }

    #[inline]
    pub fn restyle(&mut self, update: StyleUpdate) -> Result<(), StrokeError> {
        self.stroke.restyle(update)
    }

    #[inline]
    pub fn check_restyle(&self, update: &StyleUpdate) -> Result<(), StrokeError> {
        self.stroke.check_restyle(update)
    }

    /// Toggle or replace the arrowhead.
    pub fn set_arrow(&mut self, arrow: Option<ArrowStyle>) -> Result<(), StrokeError> {
        self.restyle(StyleUpdate {
            arrow: Some(arrow),
            ..Default::default()
        })
    }

    /// Move the points. The fill, if any, is re-tessellated; on error nothing changes.
    pub fn set_points(&mut self, points: &[Vec3]) -> Result<(), ShapeError> {
        let mesh = match &self.fill {
            Some(fill) => Some(fill::tessellate_outline(points, fill.options)?),
            None => None,
        };
        self.stroke.set_points(points)?;
        if let (Some(fill), Some(mesh)) = (self.fill.as_mut(), mesh) {
            fill.mesh = mesh;
        }
        Ok(())
    }

    #[inline]
    pub fn bounds(&self) -> Aabb3 {
        self.stroke.compute_bounds()
    }

    /// Release the stroke's resources and drop the fill mesh.
    pub fn dispose(&mut self) {
        self.stroke.dispose();
        self.fill = None;
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    #[inline]
    pub fn fill(&self) -> Option<&Fill> {
        self.fill.as_ref()
    }

    /// Fill color with the stroke opacity folded into alpha.
    pub fn fill_color(&self) -> Option<[f32; 4]> {
        let fill = self.fill.as_ref()?;
        let a = (fill.color.a * self.stroke.style().opacity).clamp(0.0, 1.0);
        Some([fill.color.r, fill.color.g, fill.color.b, a])
    }
}
