//! Thin binary wrapper for local development.
//!
//! `scribe` is primarily a library; this binary runs the stroke gallery demo via the library
//! runner (`run_with_builder`). The demo state lives in `demos/stroke_gallery.rs`.
//!
//! Run:
//! - `cargo run`

fn main() -> anyhow::Result<()> {
    // Keep logging setup in the binary so the library remains unopinionated.
    env_logger::init();

    scribe::render::app::run_with_builder(
        scribe::render::app::AppConfig::default().with_title("scribe: stroke gallery"),
        |window| async move { stroke_gallery::State::new(window).await },
    )
}

// Include the shared state-only demo implementation.
#[path = "../demos/stroke_gallery.rs"]
mod stroke_gallery;
