//! GPU stroke renderer.
//!
//! Draws `Stroke`s with the quad-per-segment buffers built by `StrokeGeometry` and the coverage
//! rules of `stroke::coverage`, implemented in `shaders/stroke.wgsl`.
//!
//! Resource model:
//! - One pipeline pair (single-sided for flat strokes, depth-tested double-sided for 3D ones).
//! - One `StrokeGpu` per stroke, keyed by `StrokeId`: vertex/index buffers, a uniform buffer and
//!   an RGBA32F dash atlas texture.
//! - Indices are re-uploaded only when the geometry's topology was reallocated (`Arc` identity);
//!   vertex data and uniforms are re-uploaded every `prepare`.
//! - Nothing is reclaimed automatically: call `release` when a stroke is disposed.
//!
//! Per frame: `prepare` every visible stroke, then `draw` them inside the render pass.

use std::{borrow::Cow, collections::HashMap, mem, sync::Arc};

use crate::render::gpu::{self, Gpu};
use crate::stroke::coverage::StrokeParams;
use crate::stroke::geometry::StrokeGeometry;
use crate::stroke::{DashAtlas, Stroke, StrokeId};

/// Extra screen pixels around each quad so boundary fragments are rasterized.
pub const QUAD_PAD_PX: f32 = 1.0;

/// GPU vertex: one interleaved record per `StrokeGeometry` vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StrokeVertex {
    pub position: [f32; 3],
    pub end_position: [f32; 3],
    pub prev_position: [f32; 3],
    pub next_position: [f32; 3],
    pub direction: [f32; 3],
    pub arc_lengths: [f32; 4],
    pub offset: [f32; 2],
    pub join_flags: u32,
}

impl StrokeVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x3,
        4 => Float32x3,
        5 => Float32x4,
        6 => Float32x2,
        7 => Uint32,
    ];

    #[inline]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<StrokeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Interleave the geometry's attribute arrays into `out` (cleared first).
pub fn interleave(geometry: &StrokeGeometry, out: &mut Vec<StrokeVertex>) {
    out.clear();
    out.extend(
        (0..geometry.num_vertices()).map(|i| StrokeVertex {
            position: geometry.positions()[i],
            end_position: geometry.end_positions()[i],
            prev_position: geometry.prev_positions()[i],
            next_position: geometry.next_positions()[i],
            direction: geometry.directions()[i],
            arc_lengths: geometry.arc_lengths()[i],
            offset: geometry.offsets()[i],
            join_flags: geometry.join_flags()[i],
        }),
    );
}

/// Uniform block of `stroke.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StrokeUniforms {
    pub clip_from_world: [[f32; 4]; 4],
    /// offset.xy, size.xy in device pixels (bottom-left origin).
    pub viewport: [f32; 4],
    pub color: [f32; 4],
    /// half width px, arrow half width (world), arrow visible (0/1), quad padding px.
    pub widths: [f32; 4],
    /// trim start, trim end, dash phase, dash scale.
    pub trim_dash: [f32; 4],
    /// dash enabled (0/1), dash period, atlas samples, pixels per world unit.
    pub dash_info: [f32; 4],
}

impl StrokeUniforms {
    pub fn new(params: &StrokeParams, atlas: Option<&DashAtlas>) -> Self {
        let frame = &params.frame;
        let dash = params.dash.zip(atlas);
        Self {
            clip_from_world: frame.clip_from_world.to_cols_array_2d(),
            viewport: [
                frame.viewport_offset.x,
                frame.viewport_offset.y,
                frame.viewport_size.x,
                frame.viewport_size.y,
            ],
            color: params.color,
            widths: [
                params.half_width_px,
                params.arrow_half_width,
                f32::from(u8::from(params.arrow_visible)),
                QUAD_PAD_PX,
            ],
            trim_dash: [
                params.trim[0],
                params.trim[1],
                dash.map_or(0.0, |(d, _)| d.phase),
                dash.map_or(1.0, |(d, _)| d.scale),
            ],
            dash_info: [
                f32::from(u8::from(dash.is_some())),
                dash.map_or(0.0, |(_, a)| a.period()),
                dash.map_or(0.0, |(_, a)| a.samples() as f32),
                frame.pixels_per_unit,
            ],
        }
    }
}

/// Device-side resources of one stroke.
pub struct StrokeGpu {
    vertex_buffer: wgpu::Buffer,
    vertex_bytes: u64,
    scratch: Vec<StrokeVertex>,

    index_buffer: wgpu::Buffer,
    index_count: u32,
    /// Topology currently uploaded; compared by identity.
    indices: Arc<[u32]>,

    uniform_buffer: wgpu::Buffer,
    dash_texture: wgpu::Texture,
    dash_pattern: Option<Vec<f32>>,
    bind_group: wgpu::BindGroup,

    double_sided: bool,
}

impl StrokeGpu {
    fn new(gpu: &Gpu, layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stroke Uniform Buffer"),
            size: mem::size_of::<StrokeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let dash_texture = create_dash_texture(gpu, 1);
        let bind_group = create_bind_group(gpu, layout, &uniform_buffer, &dash_texture);
        let empty: Arc<[u32]> = Arc::new([]);

        Self {
            vertex_buffer: create_buffer(gpu, "Stroke Vertex Buffer", wgpu::BufferUsages::VERTEX, 1024),
            vertex_bytes: 0,
            scratch: Vec::new(),
            index_buffer: create_buffer(gpu, "Stroke Index Buffer", wgpu::BufferUsages::INDEX, 1024),
            index_count: 0,
            indices: empty,
            uniform_buffer,
            dash_texture,
            dash_pattern: None,
            bind_group,
            double_sided: false,
        }
    }

    /// Bring the device copy up to date with `stroke`.
    fn sync(&mut self, gpu: &Gpu, layout: &wgpu::BindGroupLayout, stroke: &Stroke) {
        let geometry = stroke.geometry();

        if !Arc::ptr_eq(&self.indices, geometry.indices()) {
            let bytes: &[u8] = bytemuck::cast_slice(&geometry.indices()[..]);
            if bytes.len() as u64 > self.index_buffer.size() {
                self.index_buffer.destroy();
                self.index_buffer = create_buffer(
                    gpu,
                    "Stroke Index Buffer (resized)",
                    wgpu::BufferUsages::INDEX,
                    bytes.len() as u64,
                );
            }
            gpu.queue.write_buffer(&self.index_buffer, 0, bytes);
            self.indices = Arc::clone(geometry.indices());
            self.index_count = geometry.indices().len() as u32;
            log::debug!(
                "stroke {:?}: uploaded topology ({} indices)",
                stroke.id(),
                self.index_count
            );
        }

        interleave(geometry, &mut self.scratch);
        let bytes: &[u8] = bytemuck::cast_slice(&self.scratch);
        if bytes.len() as u64 > self.vertex_buffer.size() {
            self.vertex_buffer.destroy();
            self.vertex_buffer = create_buffer(
                gpu,
                "Stroke Vertex Buffer (resized)",
                wgpu::BufferUsages::VERTEX,
                bytes.len() as u64,
            );
        }
        gpu.queue.write_buffer(&self.vertex_buffer, 0, bytes);
        self.vertex_bytes = bytes.len() as u64;

        let pattern = stroke.dash_atlas().map(DashAtlas::pattern);
        if pattern != self.dash_pattern.as_deref() {
            self.dash_texture.destroy();
            self.dash_texture = match stroke.dash_atlas() {
                Some(atlas) => {
                    let texture = create_dash_texture(gpu, atlas.samples() as u32);
                    upload_dash_atlas(gpu, &texture, atlas);
                    texture
                }
                None => create_dash_texture(gpu, 1),
            };
            self.bind_group =
                create_bind_group(gpu, layout, &self.uniform_buffer, &self.dash_texture);
            self.dash_pattern = pattern.map(<[f32]>::to_vec);
        }

        let uniforms = StrokeUniforms::new(stroke.params(), stroke.dash_atlas());
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        self.double_sided = geometry.double_sided();
    }

    /// Free the device memory now instead of waiting for the handles to drop.
    pub fn dispose(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
        self.dash_texture.destroy();
        self.vertex_bytes = 0;
        self.index_count = 0;
    }
}

fn create_buffer(gpu: &Gpu, label: &str, usage: wgpu::BufferUsages, bytes: u64) -> wgpu::Buffer {
    // Grow to next power-ish to reduce realloc frequency.
    let size = bytes.next_power_of_two().max(256);
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_dash_texture(gpu: &Gpu, width: u32) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Stroke Dash Atlas"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn upload_dash_atlas(gpu: &Gpu, texture: &wgpu::Texture, atlas: &DashAtlas) {
    let texels = atlas.texels();
    let width = texels.len() as u32;
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&texels),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * mem::size_of::<[f32; 4]>() as u32),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
}

fn create_bind_group(
    gpu: &Gpu,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    dash_texture: &wgpu::Texture,
) -> wgpu::BindGroup {
    let view = dash_texture.create_view(&wgpu::TextureViewDescriptor::default());
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Stroke BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
        ],
    })
}

pub struct StrokeRenderer {
    single_sided: wgpu::RenderPipeline,
    double_sided: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    strokes: HashMap<StrokeId, StrokeGpu>,
}

impl StrokeRenderer {
    pub fn new(gpu: &Gpu) -> anyhow::Result<Self> {
        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Stroke Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                    "shaders/stroke.wgsl"
                ))),
            });

        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Stroke BGL"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(
                                    mem::size_of::<StrokeUniforms>() as u64,
                                ),
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Stroke Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let pipeline = |double_sided: bool| {
            gpu.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(if double_sided {
                        "Stroke Pipeline (double-sided)"
                    } else {
                        "Stroke Pipeline"
                    }),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        buffers: &[StrokeVertex::layout()],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: gpu.surface_format.add_srgb_suffix(),
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: if double_sided {
                            None
                        } else {
                            Some(wgpu::Face::Back)
                        },
                        ..Default::default()
                    },
                    depth_stencil: Some(gpu::depth_state(double_sided)),
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
        };

        Ok(Self {
            single_sided: pipeline(false),
            double_sided: pipeline(true),
            bind_group_layout,
            strokes: HashMap::new(),
        })
    }

    /// Upload whatever changed in `stroke`. Disposed strokes are released instead.
    pub fn prepare(&mut self, gpu: &Gpu, stroke: &Stroke) {
        if stroke.is_disposed() {
            self.release(stroke.id());
            return;
        }
        let layout = &self.bind_group_layout;
        let entry = self.strokes.entry(stroke.id()).or_insert_with(|| {
            log::debug!("stroke {:?}: allocating device resources", stroke.id());
            StrokeGpu::new(gpu, layout)
        });
        entry.sync(gpu, layout, stroke);
    }

    /// Record the draw for a prepared stroke. Unknown ids are skipped.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, id: StrokeId) {
        let Some(stroke) = self.strokes.get(&id) else {
            return;
        };
        if stroke.index_count == 0 {
            return;
        }

        pass.set_pipeline(if stroke.double_sided {
            &self.double_sided
        } else {
            &self.single_sided
        });
        pass.set_bind_group(0, &stroke.bind_group, &[]);
        pass.set_vertex_buffer(0, stroke.vertex_buffer.slice(..stroke.vertex_bytes));
        pass.set_index_buffer(
            stroke
                .index_buffer
                .slice(..u64::from(stroke.index_count) * mem::size_of::<u32>() as u64),
            wgpu::IndexFormat::Uint32,
        );
        pass.draw_indexed(0..stroke.index_count, 0, 0..1);
    }

    /// Destroy the resources of `id`. Returns whether anything was held.
    pub fn release(&mut self, id: StrokeId) -> bool {
        match self.strokes.remove(&id) {
            Some(mut stroke) => {
                stroke.dispose();
                log::debug!("stroke {id:?}: released device resources");
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for (_, mut stroke) in self.strokes.drain() {
            stroke.dispose();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::viewport::{RenderContext, ViewportConfig};
    use crate::stroke::StrokeStyle;
    use glam::{Vec2, Vec3};

    fn stroke(style: StrokeStyle) -> Stroke {
        let ctx = RenderContext::new(ViewportConfig::default(), Vec2::new(800.0, 800.0), 1.0);
        Stroke::new(
            &[Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)],
            style,
            &ctx,
        )
        .unwrap()
    }

    #[test]
    fn vertex_layout_matches_struct() {
        assert_eq!(mem::size_of::<StrokeVertex>(), 88);
        let layout = StrokeVertex::layout();
        assert_eq!(layout.array_stride, 88);
        assert_eq!(layout.attributes.last().map(|a| a.offset), Some(84));
        assert_eq!(mem::size_of::<StrokeUniforms>() % 16, 0);
    }

    #[test]
    fn interleave_copies_every_attribute() {
        let stroke = stroke(StrokeStyle::default());
        let geometry = stroke.geometry();
        let mut out = Vec::new();
        interleave(geometry, &mut out);
        assert_eq!(out.len(), geometry.num_vertices());
        for (i, v) in out.iter().enumerate() {
            assert_eq!(v.position, geometry.positions()[i]);
            assert_eq!(v.next_position, geometry.next_positions()[i]);
            assert_eq!(v.arc_lengths, geometry.arc_lengths()[i]);
            assert_eq!(v.offset, geometry.offsets()[i]);
            assert_eq!(v.join_flags, geometry.join_flags()[i]);
        }
    }

    #[test]
    fn uniforms_reflect_params() {
        let solid = stroke(StrokeStyle::default().with_width(0.1).with_opacity(0.5));
        let u = StrokeUniforms::new(solid.params(), solid.dash_atlas());
        assert!((u.widths[0] - 5.0).abs() < 1e-5);
        assert_eq!(u.color[3], 0.5);
        assert_eq!(u.dash_info[0], 0.0);
        assert_eq!(u.trim_dash[..2], [0.0, 2.0]);
        assert_eq!(u.viewport, [0.0, 0.0, 800.0, 800.0]);
        assert!((u.dash_info[3] - 100.0).abs() < 1e-4);

        let dashed = stroke(StrokeStyle::default().with_dash(vec![0.3, 0.1]));
        let u = StrokeUniforms::new(dashed.params(), dashed.dash_atlas());
        assert_eq!(u.dash_info[0], 1.0);
        assert!((u.dash_info[1] - 0.4).abs() < 1e-6);
        assert_eq!(u.dash_info[2], DashAtlas::SAMPLES as f32);
    }
}
