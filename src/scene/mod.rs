//! Scene graph abstractions.
//!
//! - A camera maps world coordinates to clip space (`Camera::clip_from_world`).
//! - A scene holds named shapes; each shape owns one stroke and an optional fill.
//! - Renderers consume the shapes in draw order (`Scene::draw_order`).
//!
//! The scene is renderer-agnostic: it does not depend on wgpu. Frame state (screen size, device
//! pixel ratio, camera) is passed in explicitly through `RenderContext` every frame.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3};

use crate::anim::Timeline;
use crate::render::viewport::RenderContext;
use crate::stroke::StrokeId;

pub mod fill;
pub mod shape;

pub use fill::{FillError, FillMesh, TessellateOptions};
pub use shape::{Fill, Shape, ShapeError};

/// Simple RGBA color (linear space assumed; your renderer may treat as sRGB).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Rgba {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    #[inline]
    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb3 {
    #[inline]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[inline]
    pub fn include_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Orthographic camera.
///
/// Camera model:
/// - `center`: the world point that maps to the center of the viewport
/// - `zoom`: scale factor (world -> NDC) along y
/// - `viewport_aspect`: width/height; x is divided by it so zoom stays isotropic
/// - `view`: rotation/translation applied before projection (identity for flat scenes)
///
/// The visible world height is `2 / zoom`, independent of the aspect ratio.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub center: Vec2,
    pub zoom: f32,
    pub viewport_aspect: f32,
    /// Half depth of the clip volume in world units.
    pub depth: f32,
    pub view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            zoom: 1.0,
            viewport_aspect: 1.0,
            depth: 100.0,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Camera showing `frame_height` world units vertically, centered on the origin.
    pub fn for_frame_height(frame_height: f32) -> Self {
        Self {
            zoom: 2.0 / frame_height.max(1e-6),
            ..Default::default()
        }
    }

    /// Set the viewport size in pixels to update aspect ratio.
    #[inline]
    pub fn set_viewport_px(&mut self, size: Vec2) {
        let size = size.max(Vec2::ONE);
        self.viewport_aspect = size.x / size.y;
    }

    #[inline]
    pub fn with_view(mut self, view: Mat4) -> Self {
        self.view = view;
        self
    }

    /// World -> clip transform (wgpu depth range `[0, 1]`).
    pub fn clip_from_world(&self) -> Mat4 {
        let half_h = 1.0 / self.zoom.max(1e-6);
        let half_w = half_h * self.viewport_aspect.max(1e-6);
        let projection = Mat4::orthographic_rh(
            self.center.x - half_w,
            self.center.x + half_w,
            self.center.y - half_h,
            self.center.y + half_h,
            -self.depth,
            self.depth,
        );
        projection * self.view
    }

    /// Frame the given world-space bounds into the viewport with padding.
    ///
    /// - `padding`: extra margin around the bounds in world units.
    /// - `fill_ratio`: fraction of viewport to occupy (e.g. 0.8).
    ///
    /// Only x/y of the bounds are considered.
    pub fn frame_bounds(&mut self, bounds: Aabb3, padding: f32, fill_ratio: f32) {
        if bounds.is_empty() {
            return;
        }

        let size = bounds.size().truncate() + Vec2::splat(2.0 * padding);
        let size_x = size.x.max(1e-3);
        let size_y = size.y.max(1e-3);

        self.center = bounds.center().truncate();

        let fill = fill_ratio.clamp(0.05, 0.98);
        let aspect = self.viewport_aspect.max(1e-6);

        // Visible extents are 2/zoom high and 2*aspect/zoom wide.
        let zoom_x = (2.0 * fill * aspect) / size_x;
        let zoom_y = (2.0 * fill) / size_y;

        self.zoom = zoom_x.min(zoom_y);
    }
}

/// A scene that holds named shapes.
///
/// Names are unique; adding a shape under an existing name replaces (and returns) the old one.
#[derive(Debug, Default)]
pub struct Scene {
    shapes: Vec<Shape>,
    /// A simple name index for convenience.
    index: BTreeMap<String, usize>,
}

impl Scene {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a shape. Returns the shape previously stored under the same name, which the caller
    /// is responsible for disposing.
    pub fn add(&mut self, shape: Shape) -> Option<Shape> {
        if let Some(&i) = self.index.get(shape.name()) {
            return Some(std::mem::replace(&mut self.shapes[i], shape));
        }
        let idx = self.shapes.len();
        self.index.insert(shape.name().to_string(), idx);
        self.shapes.push(shape);
        None
    }

    /// Detach a shape from the scene. It is not disposed.
    pub fn remove(&mut self, name: &str) -> Option<Shape> {
        let i = self.index.remove(name)?;
        let shape = self.shapes.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(shape)
    }

    pub fn get(&self, name: &str) -> Option<&Shape> {
        self.index.get(name).and_then(|&i| self.shapes.get(i))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Shape> {
        let i = *self.index.get(name)?;
        self.shapes.get_mut(i)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes in insertion order.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Shapes sorted by `z` (stable, so equal `z` keeps insertion order). Higher draws later.
    pub fn draw_order(&self) -> Vec<&Shape> {
        let mut out: Vec<&Shape> = self.shapes.iter().collect();
        out.sort_by_key(|s| s.z);
        out
    }

    /// Advance every shape by `dt` seconds. `ctx` must already reflect this frame.
    pub fn update(&mut self, dt: f32, ctx: &RenderContext) {
        for shape in &mut self.shapes {
            shape.update(dt, ctx);
        }
    }

    /// Apply `timeline` at time `t` then update every shape.
    ///
    /// If a track produces an invalid style the error is logged and the frame's update is
    /// skipped; returns whether the frame was applied.
    pub fn step(&mut self, timeline: &Timeline, t: f32, dt: f32, ctx: &RenderContext) -> bool {
        if let Err(err) = timeline.apply(self, t) {
            log::error!("scene: frame update aborted at t={t:.3}s: {err}");
            return false;
        }
        self.update(dt, ctx);
        true
    }

    /// Union of every shape's bounds.
    pub fn bounds(&self) -> Aabb3 {
        self.shapes
            .iter()
            .fold(Aabb3::empty(), |acc, s| acc.union(s.bounds()))
    }

    /// Dispose and drop every shape. Returns the stroke ids whose device resources should be
    /// released.
    pub fn dispose(&mut self) -> Vec<StrokeId> {
        self.index.clear();
        self.shapes
            .drain(..)
            .map(|mut shape| {
                shape.dispose();
                shape.stroke().id()
            })
            .collect()
    }
}
