//! Fill tessellation for closed shapes.
//!
//! Converts a closed outline (the shape's points, projected onto the xy plane) into a triangle
//! mesh using `lyon::tessellation::FillTessellator`.
//!
//! Notes:
//! - The outline is always closed, whether or not the last point repeats the first.
//! - Winding / fill rule matters for self-intersecting outlines; both are exposed.
//! - `z` is taken from the first point; fills are flat.

use glam::Vec3;
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FillError {
    #[error("a fill needs at least 3 points, got {count}")]
    Degenerate { count: usize },

    #[error("lyon tessellation failed: {0}")]
    Tessellation(String),
}

/// Tessellation options.
///
/// - `tolerance`: smaller => more triangles (smoother curves), larger => fewer triangles.
/// - `fill_rule`: NonZero by default; EvenOdd punches holes in self-overlapping outlines.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TessellateOptions {
    pub tolerance: f32,
    pub fill_rule: FillRule,
}

impl Default for TessellateOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            fill_rule: FillRule::NonZero,
        }
    }
}

impl TessellateOptions {
    #[inline]
    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }
}

/// A tessellated fill in world space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl FillMesh {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Total triangle area on the xy plane.
    pub fn area(&self) -> f32 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let [a, b, c] = [0, 1, 2].map(|k| self.positions[tri[k] as usize]);
                0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs()
            })
            .sum()
    }
}

/// Builds world-space positions from lyon's `FillVertex`.
struct FillVertexCtor {
    z: f32,
}

impl FillVertexConstructor<[f32; 3]> for FillVertexCtor {
    fn new_vertex(&mut self, v: FillVertex) -> [f32; 3] {
        let p = v.position();
        [p.x, p.y, self.z]
    }
}

/// Build a closed lyon path through `points`.
pub fn outline_path(points: &[Vec3]) -> Result<Path, FillError> {
    let points = match points {
        [first, .., last] if points.len() > 3 && first == last => &points[..points.len() - 1],
        _ => points,
    };
    if points.len() < 3 {
        return Err(FillError::Degenerate {
            count: points.len(),
        });
    }

    let mut b = Path::builder();
    b.begin(point(points[0].x, points[0].y));
    for p in &points[1..] {
        b.line_to(point(p.x, p.y));
    }
    b.close();
    Ok(b.build())
}

/// Tessellate the closed outline through `points`.
pub fn tessellate_outline(
    points: &[Vec3],
    opts: TessellateOptions,
) -> Result<FillMesh, FillError> {
    let path = outline_path(points)?;
    let z = points.first().map_or(0.0, |p| p.z);

    let mut tess = FillTessellator::new();
    let mut buffers: VertexBuffers<[f32; 3], u32> = VertexBuffers::new();
    let fill = FillOptions::tolerance(opts.tolerance).with_fill_rule(opts.fill_rule);

    tess.tessellate_path(
        &path,
        &fill,
        &mut BuffersBuilder::new(&mut buffers, FillVertexCtor { z }),
    )
    .map_err(|e| FillError::Tessellation(format!("{e:?}")))?;

    Ok(FillMesh {
        positions: buffers.vertices,
        indices: buffers.indices,
    })
}
