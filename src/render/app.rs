//! App entrypoint for the rendering layer.
//!
//! This module owns:
//! - the winit application lifecycle + event loop
//! - creating the window
//! - delegating to an injected async state builder
//!
//! The runner is generic over a user-defined state type `S: AppState`; the builder is async and
//! receives the created window, so demos supply their own scene without duplicating the event
//! loop boilerplate.

use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Context as _;
use log::{error, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, WindowEvent},
    keyboard::{Key, NamedKey},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

/// App-facing configuration for running the winit event loop.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial inner size in logical pixels.
    pub inner_size: (f64, f64),
    /// ControlFlow for the event loop. Default is `Poll` (continuous animation).
    pub control_flow: ControlFlow,
    /// Close the window on Escape.
    pub exit_on_escape: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "scribe".to_string(),
            inner_size: (960.0, 720.0),
            control_flow: ControlFlow::Poll,
            exit_on_escape: true,
        }
    }
}

impl AppConfig {
    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[inline]
    pub fn with_inner_size(mut self, width: f64, height: f64) -> Self {
        self.inner_size = (width, height);
        self
    }
}

/// Minimal trait a demo state must implement to be driven by the app runner.
pub trait AppState: 'static {
    /// Handle window resize (physical pixels).
    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>);

    /// Handle a device pixel ratio change. A `resize` follows when the physical size changes.
    fn rescale(&mut self, _scale_factor: f64) {}

    /// Render one frame.
    fn render(&mut self) -> anyhow::Result<()>;

    /// Request a redraw on the underlying window (used for continuous animation).
    fn request_redraw(&self);
}

/// Run the winit event loop with an injected async state builder.
///
/// Notes:
/// - The builder is called once when the app is resumed (after the window is created).
/// - The builder runs on the current thread using `pollster::block_on`.
pub fn run_with_builder<S, B, Fut>(config: AppConfig, builder: B) -> anyhow::Result<()>
where
    S: AppState,
    B: FnOnce(Arc<Window>) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<S>> + 'static,
{
    let event_loop = EventLoop::new().context("winit: failed to create EventLoop")?;
    event_loop.set_control_flow(config.control_flow);

    let mut app = App::<S>::new_with_builder(config, builder);
    event_loop
        .run_app(&mut app)
        .context("winit: run_app failed")?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Type-erased async builder for creating a state `S` from a created window.
///
/// The future is boxed and pinned so `pollster::block_on(...)` can drive it.
type BoxedStateBuilder<S> = Box<
    dyn FnOnce(Arc<Window>) -> Pin<Box<dyn Future<Output = anyhow::Result<S>> + 'static>> + 'static,
>;

/// Application state used by winit.
struct App<S: AppState> {
    config: AppConfig,
    builder: Option<BoxedStateBuilder<S>>,
    state: Option<S>,
    exiting: bool,
    /// Start-up or render error, reported from `run_with_builder` once the loop has exited.
    failure: Option<anyhow::Error>,
}

impl<S: AppState> App<S> {
    fn new_with_builder<B, Fut>(config: AppConfig, builder: B) -> Self
    where
        B: FnOnce(Arc<Window>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<S>> + 'static,
    {
        Self {
            config,
            builder: Some(Box::new(|window| Box::pin(builder(window)))),
            state: None,
            exiting: false,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let Some(builder) = self.builder.take() else {
            // Resumed again (e.g. mobile lifecycle); the state already exists.
            return Ok(());
        };

        let (width, height) = self.config.inner_size;
        let attributes = WindowAttributes::default()
            .with_title(self.config.title.as_str())
            .with_inner_size(LogicalSize::new(width, height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("winit: failed to create window")?,
        );

        let state =
            pollster::block_on(builder(window)).context("failed to initialize renderer")?;
        state.request_redraw();
        self.state = Some(state);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure = Some(err);
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        // Drop the state (and its GPU resources) before the window goes away.
        self.state = None;
        event_loop.exit();
    }
}

impl<S: AppState> ApplicationHandler for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested; exiting");
                self.exit(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. }
                if self.config.exit_on_escape
                    && event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                info!("Escape pressed; exiting");
                self.exit(event_loop);
            }
            WindowEvent::Resized(size) => {
                if self.exiting {
                    return;
                }
                state.resize(size);
                state.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if self.exiting {
                    return;
                }
                state.rescale(scale_factor);
            }
            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                if let Err(err) = state.render() {
                    self.fail(event_loop, err.context("render failed"));
                }
            }
            _ => {}
        }
    }
}
