//! Draws a whole `Scene`: fills and strokes in `z` order, restricted to the context's viewport.

use crate::render::fill_renderer::FillRenderer;
use crate::render::gpu::Gpu;
use crate::render::stroke_renderer::StrokeRenderer;
use crate::render::viewport::{RenderContext, Viewport};
use crate::scene::Scene;
use crate::stroke::StrokeId;

pub struct SceneRenderer {
    pub strokes: StrokeRenderer,
    pub fills: FillRenderer,
}

impl SceneRenderer {
    pub fn new(gpu: &Gpu) -> anyhow::Result<Self> {
        Ok(Self {
            strokes: StrokeRenderer::new(gpu)?,
            fills: FillRenderer::new(gpu)?,
        })
    }

    /// Upload every shape. Call after `Scene::update` / `Scene::step` for this frame.
    pub fn prepare(&mut self, gpu: &Gpu, scene: &Scene, ctx: &RenderContext) {
        let clip_from_world = ctx.camera.clip_from_world();
        for shape in scene.shapes() {
            self.fills.prepare(gpu, shape, clip_from_world);
            self.strokes.prepare(gpu, shape.stroke());
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, scene: &Scene, ctx: &RenderContext) {
        let Some([x, y, w, h]) = pass_viewport(&ctx.viewport) else {
            return;
        };
        pass.set_viewport(x, y, w, h, 0.0, 1.0);

        for shape in scene.draw_order() {
            let id = shape.stroke().id();
            self.fills.draw(pass, id);
            self.strokes.draw(pass, id);
        }
    }

    /// Release device resources for strokes that left the scene.
    pub fn release(&mut self, ids: impl IntoIterator<Item = StrokeId>) {
        for id in ids {
            self.strokes.release(id);
            self.fills.release(id);
        }
    }

    pub fn release_all(&mut self) {
        self.strokes.release_all();
        self.fills.release_all();
    }
}

/// `[x, y, width, height]` for `RenderPass::set_viewport` (top-left origin), or `None` when the
/// viewport is empty.
pub fn pass_viewport(viewport: &Viewport) -> Option<[f32; 4]> {
    let offset = viewport.viewport_offset();
    let size = viewport.viewport_size();
    if size.x < 1.0 || size.y < 1.0 {
        return None;
    }
    let top = viewport.screen_size().y - (offset.y + size.y);
    Some([offset.x, top.max(0.0), size.x, size.y])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::viewport::{ViewportConfig, ViewportRect};
    use glam::Vec2;

    #[test]
    fn pass_viewport_flips_to_top_left() {
        let mut viewport = Viewport::new(ViewportConfig::default(), Vec2::new(800.0, 600.0), 1.0);
        assert_eq!(pass_viewport(&viewport), Some([0.0, 0.0, 800.0, 600.0]));

        viewport.set_viewport(
            Some(ViewportRect::new(100.0, 50.0, 200.0, 100.0)),
            Vec2::new(800.0, 600.0),
            1.0,
        );
        assert_eq!(pass_viewport(&viewport), Some([100.0, 450.0, 200.0, 100.0]));

        viewport.resize(Vec2::ZERO);
        assert_eq!(pass_viewport(&viewport), None);
    }
}
