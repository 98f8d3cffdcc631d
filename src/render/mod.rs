//! Rendering module root.
//!
//! The `render` module owns the window/event-loop integration, the viewport/scale provider
//! strokes read every frame, and the GPU renderers.
//!
//! Entrypoint for demos: `render::app::run_with_builder(...)`.

pub mod app;

/// Common GPU types used across render submodules.
pub mod gpu;

/// Screen size, device pixel ratio, sub-viewport and camera, bundled per frame.
pub mod viewport;

/// Stroke pipeline (quad-per-segment buffers + coverage shader).
pub mod stroke_renderer;

/// Solid-color pipeline for tessellated fills.
pub mod fill_renderer;

pub mod scene_renderer;

/// Utility helpers for render-time math and timing.
pub mod util;
