//! Software rasterizer for strokes.
//!
//! Evaluates the coverage contract at every pixel centre inside each segment's quad and counts
//! hits per pixel. A correct stroke never hits a pixel twice (modulo self-intersections), which
//! is what the join-ownership rule exists for; `CoverageMask::overdrawn_pixels` makes that
//! observable without a GPU.
//!
//! Pixel `(x, y)` has its centre at `(x + 0.5, y + 0.5)` in screen pixels (bottom-left origin).

use glam::Vec2;

use super::Stroke;
use super::coverage::{self, StrokeParams};
use super::dash::DashAtlas;
use super::geometry::StrokeGeometry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMask {
    width: usize,
    height: usize,
    hits: Vec<u8>,
}

impl CoverageMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            hits: vec![0; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of fragments that landed on `(x, y)`; zero outside the mask.
    #[inline]
    pub fn hits(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.hits[y * self.width + x]
    }

    #[inline]
    pub fn is_covered(&self, x: usize, y: usize) -> bool {
        self.hits(x, y) > 0
    }

    pub fn covered_pixels(&self) -> usize {
        self.hits.iter().filter(|&&h| h > 0).count()
    }

    pub fn overdrawn_pixels(&self) -> usize {
        self.hits.iter().filter(|&&h| h > 1).count()
    }

    pub fn clear(&mut self) {
        self.hits.fill(0);
    }
}

/// Rasterize one stroke's buffers into `mask`.
pub fn rasterize(
    geometry: &StrokeGeometry,
    params: &StrokeParams,
    atlas: Option<&DashAtlas>,
    mask: &mut CoverageMask,
) {
    if mask.width == 0 || mask.height == 0 {
        return;
    }

    for index in 0..geometry.num_segments() {
        let Ok(segment) = geometry.segment(index) else {
            continue;
        };

        let (min, max) = coverage::quad_bounds(&segment, params);
        let Some((x0, x1)) = pixel_span(min.x, max.x, mask.width) else {
            continue;
        };
        let Some((y0, y1)) = pixel_span(min.y, max.y, mask.height) else {
            continue;
        };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let centre = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if coverage::shade(centre, &segment, params, atlas).is_covered() {
                    let hit = &mut mask.hits[y * mask.width + x];
                    *hit = hit.saturating_add(1);
                }
            }
        }
    }
}

/// Pixel indices whose centres may fall in `[lo, hi]`, clamped to `[0, len)`.
fn pixel_span(lo: f32, hi: f32, len: usize) -> Option<(usize, usize)> {
    if !(lo.is_finite() && hi.is_finite()) || hi < 0.0 || lo >= len as f32 {
        return None;
    }
    let first = lo.floor().max(0.0) as usize;
    let last = (hi.ceil() as usize).min(len - 1);
    (first <= last).then_some((first, last))
}

impl Stroke {
    /// Rasterize this stroke with its current per-frame parameters.
    pub fn rasterize(&self, mask: &mut CoverageMask) {
        rasterize(self.geometry(), self.params(), self.dash_atlas(), mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_span_clamps_to_mask() {
        assert_eq!(pixel_span(-3.0, 2.2, 10), Some((0, 3)));
        assert_eq!(pixel_span(7.5, 40.0, 10), Some((7, 9)));
        assert_eq!(pixel_span(-5.0, -1.0, 10), None);
        assert_eq!(pixel_span(12.0, 14.0, 10), None);
        assert_eq!(pixel_span(f32::NAN, 1.0, 10), None);
    }

    #[test]
    fn mask_counts_hits() {
        let mut mask = CoverageMask::new(4, 4);
        mask.hits[5] = 1;
        mask.hits[6] = 2;
        assert_eq!(mask.covered_pixels(), 2);
        assert_eq!(mask.overdrawn_pixels(), 1);
        assert!(mask.is_covered(1, 1));
        assert_eq!(mask.hits(9, 9), 0);
        mask.clear();
        assert_eq!(mask.covered_pixels(), 0);
    }
}
