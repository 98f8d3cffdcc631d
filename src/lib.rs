//! `scribe` library crate root.
//!
//! A variable-width, dashed stroke engine for programmatic diagrams:
//! - `stroke`: geometry builder, dash atlas, coverage contract and software rasterizer
//! - `scene`: shapes (stroke + optional fill), camera, scene container
//! - `anim`: keyframed timelines driving stroke styles
//! - `render`: viewport/scale provider, wgpu renderers, winit app runner
//!
//! The binary target stays thin and calls into these modules. The library does not initialize
//! logging; callers decide their own setup.

pub mod anim;
pub mod render;
pub mod scene;
pub mod stroke;

pub use render::viewport::{RenderContext, ViewportConfig, ViewportRect};
pub use scene::{Camera, Rgba, Scene, Shape};
pub use stroke::{ArrowStyle, Stroke, StrokeError, StrokeStyle, StyleUpdate};
