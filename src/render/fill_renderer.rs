//! A solid-color renderer for tessellated shape fills (`scene::FillMesh`).
//!
//! - Fill vertices are already in world space; the camera provides `clip_from_world`.
//! - One set of buffers per fill, keyed by the owning shape's `StrokeId`, so several fills can
//!   be drawn in one pass without overwriting each other's uniforms.
//! - Fills ignore depth (painter's order by shape `z`).

use std::{borrow::Cow, collections::HashMap, mem};

use glam::Mat4;

use crate::render::gpu::{self, Gpu};
use crate::scene::{FillMesh, Shape};
use crate::stroke::StrokeId;

/// Uniform layout for the solid-color pipeline.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct FillUniforms {
    clip_from_world: [[f32; 4]; 4],
    color: [f32; 4],
}

const VERTEX_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

struct FillGpu {
    vertex_buffer: wgpu::Buffer,
    vertex_bytes: u64,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// Mesh currently uploaded.
    mesh: FillMesh,
}

impl FillGpu {
    fn new(gpu: &Gpu, layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fill Uniform Buffer"),
            size: mem::size_of::<FillUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fill Uniform BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        Self {
            vertex_buffer: create_buffer(gpu, "Fill Vertex Buffer", wgpu::BufferUsages::VERTEX, 1024),
            vertex_bytes: 0,
            index_buffer: create_buffer(gpu, "Fill Index Buffer", wgpu::BufferUsages::INDEX, 1024),
            index_count: 0,
            uniform_buffer,
            bind_group,
            mesh: FillMesh::default(),
        }
    }

    fn sync(&mut self, gpu: &Gpu, mesh: &FillMesh, uniforms: FillUniforms) {
        if *mesh != self.mesh {
            let vb: &[u8] = bytemuck::cast_slice(&mesh.positions);
            let ib: &[u8] = bytemuck::cast_slice(&mesh.indices);
            if vb.len() as u64 > self.vertex_buffer.size() {
                self.vertex_buffer.destroy();
                self.vertex_buffer = create_buffer(
                    gpu,
                    "Fill Vertex Buffer (resized)",
                    wgpu::BufferUsages::VERTEX,
                    vb.len() as u64,
                );
            }
            if ib.len() as u64 > self.index_buffer.size() {
                self.index_buffer.destroy();
                self.index_buffer = create_buffer(
                    gpu,
                    "Fill Index Buffer (resized)",
                    wgpu::BufferUsages::INDEX,
                    ib.len() as u64,
                );
            }
            gpu.queue.write_buffer(&self.vertex_buffer, 0, vb);
            gpu.queue.write_buffer(&self.index_buffer, 0, ib);
            self.vertex_bytes = vb.len() as u64;
            self.index_count = mesh.indices.len() as u32;
            self.mesh = mesh.clone();
        }
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn dispose(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
        self.index_count = 0;
    }
}

fn create_buffer(gpu: &Gpu, label: &str, usage: wgpu::BufferUsages, bytes: u64) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: bytes.next_power_of_two().max(1024),
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct FillRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    fills: HashMap<StrokeId, FillGpu>,
}

impl FillRenderer {
    pub fn new(gpu: &Gpu) -> anyhow::Result<Self> {
        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Fill Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                    "shaders/fill.wgsl"
                ))),
            });

        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Fill Uniform BGL"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                mem::size_of::<FillUniforms>() as u64,
                            ),
                        },
                        count: None,
                    }],
                });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Fill Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Fill Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRS,
                    }],
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
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(gpu::depth_state(false)),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        Ok(Self {
            pipeline,
            bind_group_layout,
            fills: HashMap::new(),
        })
    }

    /// Upload the fill of `shape`, if it has one. Shapes without a fill (or disposed ones)
    /// release whatever was held for them.
    pub fn prepare(&mut self, gpu: &Gpu, shape: &Shape, clip_from_world: Mat4) {
        let id = shape.stroke().id();
        let (Some(fill), Some(color)) = (shape.fill(), shape.fill_color()) else {
            self.release(id);
            return;
        };
        if fill.mesh.is_empty() {
            self.release(id);
            return;
        }

        let layout = &self.bind_group_layout;
        let entry = self
            .fills
            .entry(id)
            .or_insert_with(|| FillGpu::new(gpu, layout));
        entry.sync(
            gpu,
            &fill.mesh,
            FillUniforms {
                clip_from_world: clip_from_world.to_cols_array_2d(),
                color,
            },
        );
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, id: StrokeId) {
        let Some(fill) = self.fills.get(&id) else {
            return;
        };
        if fill.index_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &fill.bind_group, &[]);
        pass.set_vertex_buffer(0, fill.vertex_buffer.slice(..fill.vertex_bytes));
        pass.set_index_buffer(
            fill.index_buffer
                .slice(..u64::from(fill.index_count) * mem::size_of::<u32>() as u64),
            wgpu::IndexFormat::Uint32,
        );
        pass.draw_indexed(0..fill.index_count, 0, 0..1);
    }

    pub fn release(&mut self, id: StrokeId) -> bool {
        match self.fills.remove(&id) {
            Some(mut fill) => {
                fill.dispose();
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for (_, mut fill) in self.fills.drain() {
            fill.dispose();
        }
    }
}
