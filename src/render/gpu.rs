use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

/// Depth format shared by every pipeline that draws into the main pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A surface texture acquired for one redraw. Call `present` after submitting.
pub struct SurfaceFrame {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl SurfaceFrame {
    #[inline]
    pub fn present(self) {
        self.texture.present();
    }
}

/// Minimal GPU context wrapper:
/// - Owns `wgpu::Instance`, `wgpu::Adapter`, `wgpu::Device`, `wgpu::Queue`
/// - Owns the window `Surface` and the current `SurfaceConfiguration`
/// - Owns a depth target matching the surface size (3D strokes depth-test against it)
pub struct Gpu {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    /// The surface is tied to the window.
    pub surface: wgpu::Surface<'static>,
    pub surface_format: wgpu::TextureFormat,

    pub size: winit::dpi::PhysicalSize<u32>,
    /// Device pixel ratio of the window.
    pub scale_factor: f64,
    pub config: wgpu::SurfaceConfiguration,

    depth_view: wgpu::TextureView,
}

impl Gpu {
    /// Create a GPU context for the given window.
    ///
    /// Notes:
    /// - Chooses the first surface format from surface capabilities.
    /// - Configures the surface immediately.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let size = window.inner_size();
        let scale_factor = window.scale_factor();

        // The surface holds the Arc<Window>; the app keeps the window alive for as long as the
        // state (and thus the surface) exists.
        let surface = instance
            .create_surface(window)
            .context("wgpu: failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .context("wgpu: failed to request adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .context("wgpu: failed to request device")?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .first()
            .copied()
            .context("wgpu: surface reported no supported formats")?;

        let config = Self::make_surface_config(size, surface_format);
        surface.configure(&device, &config);
        let depth_view = Self::make_depth_view(&device, size);

        log::info!(
            "gpu: {} ({:?}), surface {:?}, {}x{} @{scale_factor}x",
            adapter.get_info().name,
            adapter.get_info().backend,
            surface_format,
            size.width,
            size.height,
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_format,
            size,
            scale_factor,
            config,
            depth_view,
        })
    }

    /// Reconfigure the surface for a new size.
    ///
    /// You should call this on `WindowEvent::Resized`.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        // Avoid configuring 0-sized surfaces; winit can report 0 during minimize.
        if new_size.width == 0 || new_size.height == 0 {
            self.size = new_size;
            self.config.width = 0;
            self.config.height = 0;
            return;
        }

        self.size = new_size;
        self.config = Self::make_surface_config(new_size, self.surface_format);
        self.surface.configure(&self.device, &self.config);
        self.depth_view = Self::make_depth_view(&self.device, new_size);
    }

    #[inline]
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    /// Surface size in device pixels as floats.
    #[inline]
    pub fn size_px(&self) -> glam::Vec2 {
        glam::Vec2::new(self.size.width as f32, self.size.height as f32)
    }

    #[inline]
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Acquire the next surface texture and its SRGB view.
    ///
    /// Transient failures (outdated or lost surface, timeout) reconfigure the surface where that
    /// helps and return `Ok(None)`: skip this redraw and request another. Out-of-memory is fatal.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<SurfaceFrame>> {
        if self.config.width == 0 || self.config.height == 0 {
            return Ok(None);
        }

        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(
                wgpu::SurfaceError::Outdated
                | wgpu::SurfaceError::Lost
                | wgpu::SurfaceError::Other,
            ) => {
                log::debug!("gpu: surface needs reconfiguring, skipping frame");
                self.resize(self.size);
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("gpu: timed out acquiring surface texture");
                return Ok(None);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                anyhow::bail!("wgpu: out of memory acquiring surface texture");
            }
        };

        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.surface_format.add_srgb_suffix()),
            ..Default::default()
        });

        Ok(Some(SurfaceFrame { texture, view }))
    }

    fn make_surface_config(
        size: winit::dpi::PhysicalSize<u32>,
        surface_format: wgpu::TextureFormat,
    ) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            // We render into SRGB view format for correct gamma.
            view_formats: vec![surface_format.add_srgb_suffix()],
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            width: size.width,
            height: size.height,
            desired_maximum_frame_latency: 2,
            present_mode: wgpu::PresentMode::AutoNoVsync,
        }
    }

    fn make_depth_view(
        device: &wgpu::Device,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

/// Depth-stencil state for pipelines drawing into the main pass.
///
/// `depth_tested` pipelines test and write depth; the rest ignore it (painter's order).
pub fn depth_state(depth_tested: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: depth_tested,
        depth_compare: if depth_tested {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}
