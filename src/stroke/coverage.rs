//! The per-fragment coverage decision.
//!
//! This is the reference implementation of what the stroke fragment shader does
//! (`render/shaders/stroke.wgsl` mirrors it line for line). It is used directly by the software
//! rasterizer (`stroke::raster`) and by tests.
//!
//! Everything is evaluated in screen pixels. For a fragment inside the quad of segment `i`:
//! 1. Body: inside the capsule `start..end` of radius `half_width`.
//! 2. Join ownership: a segment with a successor drops fragments the successor covers itself
//!    (its body, dash and trim tests all pass), so overlapping neighbours draw each fragment
//!    exactly once.
//! 3. Dash: absolute arc length minus phase, wrapped by the dash cycle, classified through the
//!    dash atlas; covered inside a run or within `half_width` of a run end (rounded dashes).
//! 4. Trim: inside the capsule restricted to the visible arc window (rounded trimmed ends).
//!
//! Arrow quads skip all of the above and test only the arrowhead triangle.

use glam::{Vec2, Vec3};

use crate::render::viewport::FrameState;

use super::dash::DashAtlas;
use super::geometry::{JoinFlags, SegmentAttributes, StrokeGeometry};
use super::style::StrokeStyle;

const EPS: f32 = 1e-6;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DashParams {
    /// Static offset plus animated phase, in world units.
    pub phase: f32,
    pub scale: f32,
}

/// Per-instance inputs of the shading stage, refreshed every frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeParams {
    pub frame: FrameState,
    pub half_width_px: f32,
    /// Arrowhead half width in world units. The arrowhead is a world-space shape: it is scaled
    /// with its projected length so zooming keeps its proportions.
    pub arrow_half_width: f32,
    pub arrow_visible: bool,
    /// RGBA with opacity folded into alpha.
    pub color: [f32; 4],
    pub total_length: f32,
    /// Visible body window `[start, end]` in arc length. Empty when `end <= start`.
    pub trim: [f32; 2],
    pub dash: Option<DashParams>,
}

impl StrokeParams {
    pub fn new(
        style: &StrokeStyle,
        geometry: &StrokeGeometry,
        dash_phase: f32,
        frame: FrameState,
    ) -> Self {
        let total = geometry.length();
        let start = style.start_proportion * total;
        let mut end = style.end_proportion * total;

        let arrow = style.arrow.filter(|a| a.visible);
        if let Some(arrow) = arrow {
            // Stop the body under the arrowhead's base.
            end -= arrow.length;
        }

        Self {
            frame,
            half_width_px: 0.5 * style.width * frame.pixels_per_unit,
            arrow_half_width: 0.5 * arrow.map_or(0.0, |a| a.width),
            arrow_visible: arrow.is_some(),
            color: style.premultiplied_alpha_color(),
            total_length: total,
            trim: [start, end],
            dash: style.dash_pattern.as_ref().map(|_| DashParams {
                phase: style.dash_offset + dash_phase,
                scale: style.dash_scale,
            }),
        }
    }

    #[inline]
    pub fn trim_is_empty(&self) -> bool {
        self.trim[1] <= self.trim[0]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    OutsideBody,
    ClaimedByNeighbor,
    DashGap,
    Trimmed,
    ArrowHidden,
    OutsideArrow,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    Covered,
    Discarded(DiscardReason),
}

impl Verdict {
    #[inline]
    pub fn is_covered(self) -> bool {
        self == Verdict::Covered
    }
}

/// A segment's screen-space axis.
#[derive(Debug, Copy, Clone)]
struct SegmentAxis {
    origin: Vec2,
    dir: Vec2,
    length: f32,
}

impl SegmentAxis {
    fn new(start: Vec2, end: Vec2, fallback: Vec2) -> Self {
        let d = end - start;
        let length = d.length();
        let dir = if length > EPS { d / length } else { fallback };
        Self {
            origin: start,
            dir,
            length,
        }
    }

    /// `(tangential, normal)` coordinates of `p`.
    #[inline]
    fn local(&self, p: Vec2) -> (f32, f32) {
        let rel = p - self.origin;
        (rel.dot(self.dir), rel.dot(self.dir.perp()))
    }

    /// Distance from `(t, n)` to the axis interval `[t0, t1]`.
    #[inline]
    fn capsule_distance(t: f32, n: f32, t0: f32, t1: f32) -> f32 {
        let dt = t - t.clamp(t0, t1.max(t0));
        (dt * dt + n * n).sqrt()
    }

    /// Screen pixels per world unit of arc length along this segment.
    #[inline]
    fn px_per_world(&self, world_length: f32) -> f32 {
        if world_length > EPS {
            self.length / world_length
        } else {
            0.0
        }
    }
}

/// Screen-space unit direction of a world direction at `at`.
fn projected_direction(frame: &FrameState, at: Vec3, direction: Vec3) -> Vec2 {
    let a = frame.project(at);
    let b = frame.project(at + direction);
    (b - a).try_normalize().unwrap_or(Vec2::X)
}

/// Intersect the visible window with a segment's arc range.
#[inline]
fn visible_range(trim: [f32; 2], arc_start: f32, arc_end: f32) -> Option<(f32, f32)> {
    if trim[1] <= trim[0] {
        return None;
    }
    let lo = trim[0].max(arc_start);
    let hi = trim[1].min(arc_end);
    (lo <= hi).then_some((lo, hi))
}

/// Shade `fragment` (screen pixels) against one segment of a stroke.
pub fn shade(
    fragment: Vec2,
    segment: &SegmentAttributes,
    params: &StrokeParams,
    atlas: Option<&DashAtlas>,
) -> Verdict {
    if segment.is_arrow {
        return shade_arrow(fragment, segment, params);
    }

    let frame = &params.frame;
    let fallback = projected_direction(frame, segment.start, segment.direction);
    let start_px = frame.project(segment.start);
    let end_px = frame.project(segment.end);
    let own = SegmentAxis::new(start_px, end_px, fallback);
    let (t, n) = own.local(fragment);
    if SegmentAxis::capsule_distance(t, n, 0.0, own.length) > params.half_width_px {
        return Verdict::Discarded(DiscardReason::OutsideBody);
    }

    if segment.flags.contains(JoinFlags::HAS_NEXT) {
        // Closed strokes wrap: the successor of the last segment restarts at arc length 0.
        let next_arcs = if segment.arc_next() < segment.arc_end() {
            (0.0, segment.arc_next())
        } else {
            (segment.arc_end(), segment.arc_next())
        };
        let next = SegmentAxis::new(end_px, frame.project(segment.next), fallback);
        if covers(fragment, &next, next_arcs, params, atlas).is_ok() {
            return Verdict::Discarded(DiscardReason::ClaimedByNeighbor);
        }
    }

    match covers(fragment, &own, (segment.arc_start(), segment.arc_end()), params, atlas) {
        Ok(()) => Verdict::Covered,
        Err(reason) => Verdict::Discarded(reason),
    }
}

/// Body, dash and trim tests of one real segment, ignoring join ownership.
///
/// A segment yields a fragment to its successor only when the successor's own tests pass, so
/// every fragment is drawn by exactly one of two neighbours and dashes stay intact across joins.
fn covers(
    fragment: Vec2,
    axis: &SegmentAxis,
    (arc_start, arc_end): (f32, f32),
    params: &StrokeParams,
    atlas: Option<&DashAtlas>,
) -> Result<(), DiscardReason> {
    let hw = params.half_width_px;
    let (t, n) = axis.local(fragment);

    if SegmentAxis::capsule_distance(t, n, 0.0, axis.length) > hw {
        return Err(DiscardReason::OutsideBody);
    }

    let px_per_world = axis.px_per_world(arc_end - arc_start);
    let world_per_px = if px_per_world > 0.0 {
        1.0 / px_per_world
    } else {
        0.0
    };

    if let (Some(dash), Some(atlas)) = (params.dash, atlas) {
        let scale = dash.scale.max(EPS);
        let arc = arc_start + t * world_per_px;
        let (u, row) = atlas.lookup((arc - dash.phase) / scale);
        let along_px = row.distance_along(u) * scale * px_per_world;
        if along_px * along_px + n * n > hw * hw {
            return Err(DiscardReason::DashGap);
        }
    }

    let Some((lo, hi)) = visible_range(params.trim, arc_start, arc_end) else {
        return Err(DiscardReason::Trimmed);
    };
    let t_lo = (lo - arc_start) * px_per_world;
    let t_hi = (hi - arc_start) * px_per_world;
    if SegmentAxis::capsule_distance(t, n, t_lo, t_hi) > hw {
        return Err(DiscardReason::Trimmed);
    }

    Ok(())
}

fn shade_arrow(fragment: Vec2, segment: &SegmentAttributes, params: &StrokeParams) -> Verdict {
    if !params.arrow_visible {
        return Verdict::Discarded(DiscardReason::ArrowHidden);
    }

    let frame = &params.frame;
    let base = frame.project(segment.start);
    let tip = frame.project(segment.end);
    let fallback = projected_direction(frame, segment.start, segment.direction);
    let axis = SegmentAxis::new(base, tip, fallback);
    let normal = axis.dir.perp() * arrow_half_width_px(segment, params, axis.length);

    if inside_triangle(fragment, [tip, base + normal, base - normal]) {
        Verdict::Covered
    } else {
        Verdict::Discarded(DiscardReason::OutsideArrow)
    }
}

/// Arrowhead half width in pixels, using the same pixels-per-world as the projected arrow length.
fn arrow_half_width_px(segment: &SegmentAttributes, params: &StrokeParams, length_px: f32) -> f32 {
    let world_length = segment.arc_end() - segment.arc_start();
    if world_length > EPS {
        params.arrow_half_width * length_px / world_length
    } else {
        params.arrow_half_width * params.frame.pixels_per_unit
    }
}

/// Edge-function test; accepts either winding, boundary counts as inside.
fn inside_triangle(p: Vec2, [a, b, c]: [Vec2; 3]) -> bool {
    let edge = |from: Vec2, to: Vec2| (to - from).perp_dot(p - from);
    let area = (b - a).perp_dot(c - a);
    if area.abs() <= EPS {
        return false;
    }
    let sign = area.signum();
    edge(a, b) * sign >= 0.0 && edge(b, c) * sign >= 0.0 && edge(c, a) * sign >= 0.0
}

/// Screen-space bounding box of the quad the shading stage rasterizes for `segment`.
pub fn quad_bounds(segment: &SegmentAttributes, params: &StrokeParams) -> (Vec2, Vec2) {
    let frame = &params.frame;
    let a = frame.project(segment.start);
    let b = frame.project(segment.end);
    let pad = if segment.is_arrow {
        arrow_half_width_px(segment, params, a.distance(b))
    } else {
        params.half_width_px
    };
    (a.min(b) - Vec2::splat(pad), a.max(b) + Vec2::splat(pad))
}
