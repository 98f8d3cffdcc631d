//! Demo: a gallery of strokes driven by a `Timeline`.
//!
//! - "square": filled rectangle drawn on with an `EndProportion` 0 -> 1 ("create")
//! - "ring": closed dashed circle with marching dashes
//! - "wave": dashed polyline whose points move every frame (in-place buffer refresh)
//! - "pointer": arrow whose head rides the trimmed end
//! - "helix": 3D stroke (depth-tested, double-sided)
//!
//! Run:
//! - `RUST_LOG=info cargo run`
//!
//! This file must not define `fn main()`; it is included by `src/main.rs`.

use std::sync::Arc;

use anyhow::Context as _;
use glam::{Vec2, Vec3};
use winit::window::Window;

use scribe::{
    anim::{AnimTarget, Ease, Keyframe, Timeline, Track},
    render::{
        app::AppState,
        gpu::Gpu,
        scene_renderer::SceneRenderer,
        util::FrameClock,
    },
    scene::{Rgba, Scene, Shape, TessellateOptions},
    stroke::{ArrowStyle, StrokeStyle},
    RenderContext, ViewportConfig,
};

const WAVE_POINTS: usize = 96;

pub struct State {
    pub window: Arc<Window>,
    pub gpu: Gpu,
    pub ctx: RenderContext,
    pub scene: Scene,
    pub renderer: SceneRenderer,

    clock: FrameClock,
    timeline: Timeline,
    wave: Vec<Vec3>,
}

impl State {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gpu = Gpu::new(window.clone()).await?;
        let ctx = RenderContext::new(
            ViewportConfig::default(),
            gpu.size_px(),
            gpu.scale_factor as f32,
        );

        let mut scene = Scene::new();

        let square = Shape::rectangle(
            "square",
            Vec2::new(-4.0, 1.5),
            Vec2::splat(2.0),
            StrokeStyle::default()
                .with_width(0.06)
                .with_color(Rgba::rgb(0.95, 0.75, 0.30))
                .with_proportions(0.0, 0.0),
            &ctx,
        )?
        .with_fill(Rgba::rgb(0.95, 0.75, 0.30).with_alpha(0.25), TessellateOptions::default())
        .context("square fill")?
        .with_z(-1);
        scene.add(square);

        scene.add(Shape::circle(
            "ring",
            Vec2::new(0.0, 1.5),
            1.1,
            96,
            StrokeStyle::default()
                .with_width(0.05)
                .with_color(Rgba::rgb(0.45, 0.70, 0.95))
                .with_dash(vec![0.25, 0.12, 0.0, 0.12])
                .with_dash_speed(0.4),
            &ctx,
        )?);

        let wave = wave_points(0.0);
        scene.add(Shape::polyline(
            "wave",
            &wave,
            StrokeStyle::default()
                .with_width(0.08)
                .with_color(Rgba::rgb(0.40, 0.85, 0.50))
                .with_dash(vec![0.4, 0.15]),
            &ctx,
        )?);

        scene.add(Shape::arrow(
            "pointer",
            Vec3::new(2.5, 0.5, 0.0),
            Vec3::new(5.0, 2.5, 0.0),
            StrokeStyle::default()
                .with_width(0.05)
                .with_arrow(ArrowStyle {
                    width: 0.25,
                    length: 0.35,
                    visible: true,
                }),
            &ctx,
        )?);

        let helix: Vec<Vec3> = (0..200)
            .map(|i| {
                let a = i as f32 * 0.12;
                Vec3::new(4.0 + 0.6 * a.cos(), -3.2 + 0.012 * i as f32, 0.6 * a.sin())
            })
            .collect();
        scene.add(Shape::polyline(
            "helix",
            &helix,
            StrokeStyle::default()
                .with_width(0.04)
                .with_color(Rgba::rgb(0.90, 0.45, 0.60))
                .three_dimensional(true),
            &ctx,
        )?);

        let mut timeline = Timeline::new();
        timeline.add_track(
            Track::new_end_proportion(AnimTarget::Name("square".to_string())).with_keyframes(vec![
                Keyframe::at(0.2, 0.0).ease(Ease::InOutCubic),
                Keyframe::at(1.8, 1.0),
            ]),
        );
        timeline.add_track(
            Track::new_opacity(AnimTarget::Name("ring".to_string())).with_keyframes(vec![
                Keyframe::at(0.0, 0.0).ease(Ease::OutCubic),
                Keyframe::at(1.0, 1.0),
            ]),
        );
        timeline.add_track(
            Track::new_end_proportion(AnimTarget::Name("pointer".to_string())).with_keyframes(
                vec![
                    Keyframe::at(0.5, 0.15).ease(Ease::InOutQuad),
                    Keyframe::at(2.5, 1.0),
                ],
            ),
        );
        timeline.add_track(
            Track::new_width(AnimTarget::Name("pointer".to_string())).with_keyframes(vec![
                Keyframe::at(2.5, 0.05).ease(Ease::OutQuad),
                Keyframe::at(3.0, 0.09),
            ]),
        );

        let renderer = SceneRenderer::new(&gpu)?;
        // Replay the timeline with a short hold on the final frame.
        let replay = timeline.bounds().map_or(0.0, |(_, end)| end + 1.5);

        Ok(Self {
            window,
            gpu,
            ctx,
            scene,
            renderer,
            clock: FrameClock::new().looping(replay),
            timeline,
            wave,
        })
    }
}

fn wave_points(t: f32) -> Vec<Vec3> {
    (0..WAVE_POINTS)
        .map(|i| {
            let u = i as f32 / (WAVE_POINTS - 1) as f32;
            let x = -5.5 + 11.0 * u;
            Vec3::new(x, -2.0 + 0.6 * (std::f32::consts::TAU * 0.35 * (t + 2.0 * u)).sin(), 0.0)
        })
        .collect()
}

impl AppState for State {
    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.ctx.resize(self.gpu.size_px());
    }

    fn rescale(&mut self, scale_factor: f64) {
        self.gpu.set_scale_factor(scale_factor);
        self.ctx.set_viewport(
            self.ctx.viewport.sub_viewport(),
            self.gpu.size_px(),
            scale_factor as f32,
        );
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let time = self.clock.tick();

        self.wave = wave_points(time.elapsed);
        if let Some(wave) = self.scene.get_mut("wave") {
            wave.set_points(&self.wave)?;
        }

        // The context is current (resize/rescale ran before this redraw), so strokes can update.
        self.scene.step(&self.timeline, time.timeline, time.dt, &self.ctx);
        self.renderer.prepare(&self.gpu, &self.scene, &self.ctx);

        let Some(frame) = self.gpu.next_frame()? else {
            self.window.request_redraw();
            return Ok(());
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Stroke Gallery Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Stroke Gallery Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.06,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.gpu.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            self.renderer.draw(&mut pass, &self.scene, &self.ctx);
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();

        self.window.request_redraw();
        Ok(())
    }

    fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl Drop for State {
    fn drop(&mut self) {
        let ids = self.scene.dispose();
        self.renderer.release(ids);
    }
}
