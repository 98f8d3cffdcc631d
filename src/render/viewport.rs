//! Viewport and scale provider.
//!
//! Strokes need three pieces of frame state that live outside of them:
//! - the screen size in device pixels and the device pixel ratio
//! - an optional sub-viewport (for split-screen / multi-view layouts)
//! - the camera's world -> clip transform
//!
//! These are bundled into an explicit `RenderContext` value that is passed to stroke
//! construction and to every per-frame `update`. The caller owns the ordering: refresh the
//! context (resize, viewport reassignment, camera moves) *before* updating strokes, otherwise
//! strokes render one frame with stale sizes.
//!
//! Screen-pixel convention used by the software coverage path and the WGSL shader alike:
//! origin at the bottom-left of the screen, y up, units are device pixels.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles as _};

use crate::scene::Camera;

/// Viewport configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportConfig {
    /// World units spanned by the viewport's height at the reference scale.
    ///
    /// Stroke widths are expressed in world units relative to this height and converted to
    /// pixels without looking at the camera, so zooming never thickens or thins a stroke.
    pub frame_height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { frame_height: 8.0 }
    }
}

/// A sub-rectangle of the screen in logical (DPI-independent) pixels, bottom-left origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportRect {
    pub offset: Vec2,
    pub size: Vec2,
}

impl ViewportRect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            offset: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    config: ViewportConfig,
    screen_size: Vec2,
    device_pixel_ratio: f32,
    sub_viewport: Option<ViewportRect>,

    // Derived, in device pixels.
    viewport_offset: Vec2,
    viewport_size: Vec2,
}

impl Viewport {
    /// Full-screen viewport.
    pub fn new(config: ViewportConfig, screen_size: Vec2, device_pixel_ratio: f32) -> Self {
        let mut viewport = Self {
            config,
            screen_size,
            device_pixel_ratio,
            sub_viewport: None,
            viewport_offset: Vec2::ZERO,
            viewport_size: screen_size,
        };
        viewport.set_viewport(None, screen_size, device_pixel_ratio);
        viewport
    }

    /// Reassign the viewport.
    ///
    /// - `rect`: sub-viewport in logical pixels, or `None` for full screen.
    /// - `screen_size`: full screen size in device pixels.
    ///
    /// The sub-viewport is scaled by the device pixel ratio and clamped to the screen.
    pub fn set_viewport(
        &mut self,
        rect: Option<ViewportRect>,
        screen_size: Vec2,
        device_pixel_ratio: f32,
    ) {
        self.screen_size = screen_size.max(Vec2::ZERO);
        self.device_pixel_ratio = if device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        self.sub_viewport = rect;

        match rect {
            None => {
                self.viewport_offset = Vec2::ZERO;
                self.viewport_size = self.screen_size;
            }
            Some(rect) => {
                let offset = (rect.offset * self.device_pixel_ratio).clamp(Vec2::ZERO, self.screen_size);
                let far = ((rect.offset + rect.size) * self.device_pixel_ratio)
                    .clamp(offset, self.screen_size);
                self.viewport_offset = offset;
                self.viewport_size = far - offset;
            }
        }
    }

    /// Keep the current sub-viewport and pixel ratio, change the screen size.
    #[inline]
    pub fn resize(&mut self, screen_size: Vec2) {
        self.set_viewport(self.sub_viewport, screen_size, self.device_pixel_ratio);
    }

    #[inline]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    #[inline]
    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    #[inline]
    pub fn sub_viewport(&self) -> Option<ViewportRect> {
        self.sub_viewport
    }

    #[inline]
    pub fn viewport_offset(&self) -> Vec2 {
        self.viewport_offset
    }

    #[inline]
    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_size
    }

    /// Device pixels per world unit of stroke width.
    #[inline]
    pub fn pixels_per_unit(&self) -> f32 {
        if self.config.frame_height <= 0.0 {
            return 0.0;
        }
        self.viewport_size.y / self.config.frame_height
    }

    /// Convert a world-unit width into device pixels.
    #[inline]
    pub fn width_to_pixels(&self, width: f32) -> f32 {
        width * self.pixels_per_unit()
    }
}

/// Everything a stroke reads from the outside world each frame.
#[derive(Debug, Copy, Clone)]
pub struct RenderContext {
    pub viewport: Viewport,
    pub camera: Camera,
}

impl RenderContext {
    /// Full-screen context with a camera framing `config.frame_height` world units.
    pub fn new(config: ViewportConfig, screen_size: Vec2, device_pixel_ratio: f32) -> Self {
        let viewport = Viewport::new(config, screen_size, device_pixel_ratio);
        let mut camera = Camera::for_frame_height(config.frame_height);
        camera.set_viewport_px(viewport.viewport_size());
        Self { viewport, camera }
    }

    /// Reassign the viewport and keep the camera's aspect ratio in sync.
    pub fn set_viewport(
        &mut self,
        rect: Option<ViewportRect>,
        screen_size: Vec2,
        device_pixel_ratio: f32,
    ) {
        self.viewport
            .set_viewport(rect, screen_size, device_pixel_ratio);
        self.camera.set_viewport_px(self.viewport.viewport_size());
    }

    #[inline]
    pub fn resize(&mut self, screen_size: Vec2) {
        self.viewport.resize(screen_size);
        self.camera.set_viewport_px(self.viewport.viewport_size());
    }

    /// Snapshot of the frame state a stroke copies into its per-instance parameters.
    pub fn frame(&self) -> FrameState {
        FrameState {
            clip_from_world: self.camera.clip_from_world(),
            viewport_offset: self.viewport.viewport_offset(),
            viewport_size: self.viewport.viewport_size(),
            pixels_per_unit: self.viewport.pixels_per_unit(),
        }
    }

    #[inline]
    pub fn project(&self, world: Vec3) -> Vec2 {
        self.frame().project(world)
    }
}

/// Per-frame values copied out of a `RenderContext`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameState {
    pub clip_from_world: Mat4,
    pub viewport_offset: Vec2,
    pub viewport_size: Vec2,
    pub pixels_per_unit: f32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            clip_from_world: Mat4::IDENTITY,
            viewport_offset: Vec2::ZERO,
            viewport_size: Vec2::ONE,
            pixels_per_unit: 1.0,
        }
    }
}

impl FrameState {
    /// World position -> screen pixels (bottom-left origin, y up).
    pub fn project(&self, world: Vec3) -> Vec2 {
        let clip = self.clip_from_world * world.extend(1.0);
        let w = if clip.w.abs() < 1e-8 { 1e-8 } else { clip.w };
        let ndc = clip.xy() / w;
        self.viewport_offset + (ndc * 0.5 + 0.5) * self.viewport_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_screen_passthrough() {
        let viewport = Viewport::new(ViewportConfig::default(), Vec2::new(1280.0, 720.0), 2.0);
        assert_eq!(viewport.viewport_offset(), Vec2::ZERO);
        assert_eq!(viewport.viewport_size(), Vec2::new(1280.0, 720.0));
        assert!((viewport.width_to_pixels(0.08) - 7.2).abs() < 1e-4);
    }

    #[test]
    fn sub_viewport_is_scaled_and_clamped() {
        let mut viewport = Viewport::new(ViewportConfig::default(), Vec2::new(800.0, 600.0), 1.0);
        viewport.set_viewport(
            Some(ViewportRect::new(100.0, 50.0, 200.0, 400.0)),
            Vec2::new(800.0, 600.0),
            2.0,
        );
        assert_eq!(viewport.viewport_offset(), Vec2::new(200.0, 100.0));
        // Far edge 600 * 2 = 1200 is clamped to the 600px screen.
        assert_eq!(viewport.viewport_size(), Vec2::new(400.0, 500.0));

        viewport.set_viewport(None, Vec2::new(800.0, 600.0), 1.0);
        assert_eq!(viewport.viewport_size(), Vec2::new(800.0, 600.0));
    }

    #[test]
    fn stroke_width_ignores_camera_zoom() {
        let mut ctx = RenderContext::new(ViewportConfig::default(), Vec2::new(800.0, 800.0), 1.0);
        let before = ctx.viewport.width_to_pixels(0.1);
        ctx.camera.zoom *= 4.0;
        assert_eq!(ctx.viewport.width_to_pixels(0.1), before);
        assert_eq!(ctx.frame().pixels_per_unit, 100.0);
    }

    #[test]
    fn projection_maps_frame_to_viewport() {
        let ctx = RenderContext::new(ViewportConfig::default(), Vec2::new(800.0, 800.0), 1.0);
        assert!((ctx.project(Vec3::ZERO) - Vec2::new(400.0, 400.0)).length() < 1e-3);
        assert!((ctx.project(Vec3::new(4.0, 4.0, 0.0)) - Vec2::new(800.0, 800.0)).length() < 1e-3);
        assert!((ctx.project(Vec3::new(1.0, 0.0, 0.0)) - Vec2::new(500.0, 400.0)).length() < 1e-3);
    }
}
