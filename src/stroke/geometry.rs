//! Stroke geometry builder.
//!
//! Converts an ordered list of points into a quad-per-segment vertex buffer. The quads are not
//! expanded here: every vertex of segment `i` carries the segment's world-space endpoints plus
//! its neighbours, and a signed corner offset `(tangential, normal)` telling the shading stage
//! which corner it is. Expansion to a screen-space quad happens per frame, which keeps the width
//! pixel-exact under any camera.
//!
//! Buffer layout, per vertex (4 per segment, same values for the 4 vertices of a segment except
//! `offsets`):
//! - `positions`: segment start
//! - `end_positions`: segment end
//! - `prev_positions`: start of the previous segment (wrapped for closed strokes)
//! - `next_positions`: end of the next segment (wrapped for closed strokes)
//! - `directions`: unit tangent, falling back to the nearest non-degenerate neighbour
//! - `arc_lengths`: `[start, end, prev_start, next_end]`
//! - `join_flags`: `HAS_PREV` / `HAS_NEXT`
//! - `offsets`: corner offset; normal magnitude `ARROW_NORMAL_SCALE` marks arrow corners
//!
//! `offsets` and `indices` only depend on the segment count and are shared (`Arc`) across
//! in-place refreshes; a new allocation means the topology changed.

use std::sync::Arc;

use glam::Vec3;

use crate::scene::Aabb3;

use super::StrokeError;
use super::style::ArrowStyle;

/// Normal magnitude of the corner offsets of arrow segments.
pub const ARROW_NORMAL_SCALE: f32 = 2.0;

/// Segments shorter than this are treated as degenerate.
const DEGENERATE_EPS: f32 = 1e-6;

/// Corner order within a quad: start-right, start-left, end-right, end-left.
const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, 1.0]];

/// Two CCW triangles (in the tangent/normal frame) per quad.
const QUAD_INDICES: [u32; 6] = [0, 2, 1, 1, 2, 3];

/// Adjacency flags stored per vertex.
///
/// A segment with `HAS_NEXT` yields the fragments its successor covers, so every shared vertex
/// disk is drawn by exactly one segment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct JoinFlags(pub u32);

impl JoinFlags {
    pub const NONE: Self = Self(0);
    pub const HAS_PREV: Self = Self(1 << 0);
    pub const HAS_NEXT: Self = Self(1 << 1);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// True for corner offsets written for arrow segments.
#[inline]
pub fn is_arrow_offset(offset: [f32; 2]) -> bool {
    offset[1].abs() > 1.5
}

/// Where the arrowhead sits in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArrowPlacement {
    pub tip: Vec3,
    pub base: Vec3,
    pub direction: Vec3,
    /// Arc length of the tip along the stroke.
    pub tip_arc: f32,
    /// Index of the real segment the tip lies on.
    pub segment: usize,
}

/// Attributes of one segment read back from the vertex buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SegmentAttributes {
    pub start: Vec3,
    pub end: Vec3,
    pub prev: Vec3,
    pub next: Vec3,
    pub direction: Vec3,
    pub arc_lengths: [f32; 4],
    pub flags: JoinFlags,
    pub is_arrow: bool,
}

impl SegmentAttributes {
    #[inline]
    pub fn arc_start(&self) -> f32 {
        self.arc_lengths[0]
    }

    #[inline]
    pub fn arc_end(&self) -> f32 {
        self.arc_lengths[1]
    }

    #[inline]
    pub fn arc_prev(&self) -> f32 {
        self.arc_lengths[2]
    }

    #[inline]
    pub fn arc_next(&self) -> f32 {
        self.arc_lengths[3]
    }
}

/// Inputs besides the points that shape the buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeometryOptions {
    pub arrow: Option<ArrowStyle>,
    /// Proportion of the stroke length at which the arrow tip sits.
    pub arrow_proportion: f32,
    pub three_dimensional: bool,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            arrow: None,
            arrow_proportion: 1.0,
            three_dimensional: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrokeGeometry {
    points: Vec<Vec3>,
    /// Cumulative arc length per point.
    point_arcs: Vec<f32>,
    /// Unit direction per real segment (with degenerate fallback).
    segment_dirs: Vec<Vec3>,
    closed: bool,
    options: GeometryOptions,
    arrow: Option<ArrowPlacement>,

    positions: Vec<[f32; 3]>,
    end_positions: Vec<[f32; 3]>,
    prev_positions: Vec<[f32; 3]>,
    next_positions: Vec<[f32; 3]>,
    directions: Vec<[f32; 3]>,
    arc_lengths: Vec<[f32; 4]>,
    join_flags: Vec<u32>,
    offsets: Arc<[[f32; 2]]>,
    indices: Arc<[u32]>,
}

impl StrokeGeometry {
    /// Build the buffers for `points`.
    ///
    /// Fails with `StrokeError::Construction` unless there are at least two points and at least
    /// two of them are distinct.
    pub fn build(points: &[Vec3], options: GeometryOptions) -> Result<Self, StrokeError> {
        validate_points(points)?;

        let real_segments = points.len() - 1;
        let segments = real_segments + usize::from(options.arrow.is_some());
        let (offsets, indices) = topology(real_segments, segments);

        let vertex_count = segments * 4;
        let mut geometry = Self {
            points: Vec::new(),
            point_arcs: Vec::new(),
            segment_dirs: Vec::new(),
            closed: false,
            options,
            arrow: None,
            positions: vec![[0.0; 3]; vertex_count],
            end_positions: vec![[0.0; 3]; vertex_count],
            prev_positions: vec![[0.0; 3]; vertex_count],
            next_positions: vec![[0.0; 3]; vertex_count],
            directions: vec![[0.0; 3]; vertex_count],
            arc_lengths: vec![[0.0; 4]; vertex_count],
            join_flags: vec![0; vertex_count],
            offsets,
            indices,
        };
        geometry.write_points(points);

        log::debug!(
            "stroke geometry: allocated {segments} segments ({vertex_count} vertices, closed={})",
            geometry.closed
        );
        Ok(geometry)
    }

    /// Replace the points.
    ///
    /// Same point count: variable attributes are refreshed in place and the shared topology
    /// (`offsets`, `indices`) is kept. Different count: everything is reallocated. On error the
    /// current buffers are left untouched.
    pub fn update(&mut self, points: &[Vec3]) -> Result<(), StrokeError> {
        validate_points(points)?;

        if points.len() == self.points.len() {
            self.write_points(points);
            log::trace!("stroke geometry: refreshed {} points in place", points.len());
        } else {
            *self = Self::build(points, self.options)?;
        }
        Ok(())
    }

    /// Change the arrow configuration.
    ///
    /// Toggling the arrow changes the segment count and reallocates; otherwise only the arrow
    /// segment's attributes are rewritten.
    pub fn set_arrow(
        &mut self,
        arrow: Option<ArrowStyle>,
        proportion: f32,
    ) -> Result<(), StrokeError> {
        let options = GeometryOptions {
            arrow,
            arrow_proportion: proportion,
            ..self.options
        };

        if arrow.is_some() != self.options.arrow.is_some() {
            *self = Self::build(&self.points, options)?;
        } else {
            self.options = options;
            self.write_arrow();
        }
        Ok(())
    }

    /// Move the arrow tip to `proportion` of the stroke length.
    pub fn place_arrow(&mut self, proportion: f32) {
        self.options.arrow_proportion = proportion;
        self.write_arrow();
    }

    fn write_points(&mut self, points: &[Vec3]) {
        self.points.clear();
        self.points.extend_from_slice(points);

        self.point_arcs.clear();
        self.point_arcs.reserve(points.len());
        let mut acc = 0.0f32;
        self.point_arcs.push(0.0);
        for pair in points.windows(2) {
            acc += pair[0].distance(pair[1]);
            self.point_arcs.push(acc);
        }

        self.closed =
            points.len() > 2 && points[0].distance(points[points.len() - 1]) <= DEGENERATE_EPS;
        self.segment_dirs = segment_directions(points);

        let n = points.len() - 1;
        for i in 0..n {
            let has_prev = i > 0 || self.closed;
            let has_next = i + 1 < n || self.closed;

            let prev = if i > 0 {
                points[i - 1]
            } else if self.closed {
                points[n - 1]
            } else {
                points[0]
            };
            let next = if i + 1 < n {
                points[i + 2]
            } else if self.closed {
                points[1]
            } else {
                points[n]
            };

            // Open strokes clamp at their ends; closed strokes wrap, which shows up as
            // `prev > start` / `next < end`.
            let arc_prev = if i > 0 {
                self.point_arcs[i - 1]
            } else if self.closed {
                self.point_arcs[n - 1]
            } else {
                0.0
            };
            let arc_next = if i + 1 < n {
                self.point_arcs[i + 2]
            } else if self.closed {
                self.point_arcs[1]
            } else {
                self.point_arcs[n]
            };

            let mut flags = JoinFlags::NONE;
            if has_prev {
                flags = flags.union(JoinFlags::HAS_PREV);
            }
            if has_next {
                flags = flags.union(JoinFlags::HAS_NEXT);
            }

            self.write_segment(
                i,
                SegmentAttributes {
                    start: points[i],
                    end: points[i + 1],
                    prev,
                    next,
                    direction: self.segment_dirs[i],
                    arc_lengths: [self.point_arcs[i], self.point_arcs[i + 1], arc_prev, arc_next],
                    flags,
                    is_arrow: false,
                },
            );
        }

        self.write_arrow();
    }

    fn write_arrow(&mut self) {
        let Some(style) = self.options.arrow else {
            self.arrow = None;
            return;
        };

        let placement = self.arrow_placement_at(self.options.arrow_proportion, style);
        let base_arc = placement.tip_arc - style.length;
        let index = self.num_real_segments();
        self.write_segment(
            index,
            SegmentAttributes {
                start: placement.base,
                end: placement.tip,
                prev: placement.base,
                next: placement.tip,
                direction: placement.direction,
                arc_lengths: [base_arc, placement.tip_arc, base_arc, placement.tip_arc],
                flags: JoinFlags::NONE,
                is_arrow: true,
            },
        );
        self.arrow = Some(placement);
    }

    fn arrow_placement_at(&self, proportion: f32, style: ArrowStyle) -> ArrowPlacement {
        let tip_arc = proportion.clamp(0.0, 1.0) * self.length();
        let segment = self.segment_at_arc(tip_arc);
        let tip = self.point_on_segment(segment, tip_arc);
        let direction = self.segment_dirs[segment];
        ArrowPlacement {
            tip,
            base: tip - direction * style.length,
            direction,
            tip_arc,
            segment,
        }
    }

    fn write_segment(&mut self, segment: usize, attrs: SegmentAttributes) {
        let base = segment * 4;
        for v in base..base + 4 {
            self.positions[v] = attrs.start.to_array();
            self.end_positions[v] = attrs.end.to_array();
            self.prev_positions[v] = attrs.prev.to_array();
            self.next_positions[v] = attrs.next.to_array();
            self.directions[v] = attrs.direction.to_array();
            self.arc_lengths[v] = attrs.arc_lengths;
            self.join_flags[v] = attrs.flags.0;
        }
    }

    /// First real segment whose arc range contains `arc` (the earlier one at shared vertices).
    pub fn segment_at_arc(&self, arc: f32) -> usize {
        let last = self.num_real_segments() - 1;
        (0..=last)
            .find(|&i| arc <= self.point_arcs[i + 1])
            .unwrap_or(last)
    }

    /// Segment straddling `proportion` of the total length.
    #[inline]
    pub fn segment_at_proportion(&self, proportion: f32) -> usize {
        self.segment_at_arc(proportion.clamp(0.0, 1.0) * self.length())
    }

    /// World position at `proportion` of the total length.
    pub fn point_at_proportion(&self, proportion: f32) -> Vec3 {
        let arc = proportion.clamp(0.0, 1.0) * self.length();
        self.point_on_segment(self.segment_at_arc(arc), arc)
    }

    fn point_on_segment(&self, segment: usize, arc: f32) -> Vec3 {
        let (s0, s1) = (self.point_arcs[segment], self.point_arcs[segment + 1]);
        let (p0, p1) = (self.points[segment], self.points[segment + 1]);
        let span = s1 - s0;
        if span <= DEGENERATE_EPS {
            return p0;
        }
        p0.lerp(p1, ((arc - s0) / span).clamp(0.0, 1.0))
    }

    /// Read one segment's attributes back from the buffer.
    pub fn segment(&self, segment: usize) -> Result<SegmentAttributes, StrokeError> {
        if segment >= self.num_segments() {
            return Err(StrokeError::Lookup {
                what: "segment",
                index: segment,
                len: self.num_segments(),
            });
        }
        let v = segment * 4;
        Ok(SegmentAttributes {
            start: Vec3::from_array(self.positions[v]),
            end: Vec3::from_array(self.end_positions[v]),
            prev: Vec3::from_array(self.prev_positions[v]),
            next: Vec3::from_array(self.next_positions[v]),
            direction: Vec3::from_array(self.directions[v]),
            arc_lengths: self.arc_lengths[v],
            flags: JoinFlags(self.join_flags[v]),
            is_arrow: is_arrow_offset(self.offsets[v]),
        })
    }

    pub fn point(&self, index: usize) -> Result<Vec3, StrokeError> {
        self.points
            .get(index)
            .copied()
            .ok_or(StrokeError::Lookup {
                what: "point",
                index,
                len: self.points.len(),
            })
    }

    pub fn arc_length_at(&self, index: usize) -> Result<f32, StrokeError> {
        self.point_arcs
            .get(index)
            .copied()
            .ok_or(StrokeError::Lookup {
                what: "arc length",
                index,
                len: self.point_arcs.len(),
            })
    }

    /// Bounds of the visible stroke body: real points only, arrow geometry excluded.
    pub fn compute_bounds(&self) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        for &p in &self.points {
            bounds.include_point(p);
        }
        bounds
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Total arc length of the real segments.
    #[inline]
    pub fn length(&self) -> f32 {
        self.point_arcs.last().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn num_real_segments(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    #[inline]
    pub fn num_arrow_segments(&self) -> usize {
        usize::from(self.options.arrow.is_some())
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.num_real_segments() + self.num_arrow_segments()
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 3D strokes are drawn double-sided with depth testing; 2D strokes single-sided.
    #[inline]
    pub fn double_sided(&self) -> bool {
        self.options.three_dimensional
    }

    #[inline]
    pub fn options(&self) -> &GeometryOptions {
        &self.options
    }

    #[inline]
    pub fn arrow(&self) -> Option<&ArrowPlacement> {
        self.arrow.as_ref()
    }

    #[inline]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    #[inline]
    pub fn end_positions(&self) -> &[[f32; 3]] {
        &self.end_positions
    }

    #[inline]
    pub fn prev_positions(&self) -> &[[f32; 3]] {
        &self.prev_positions
    }

    #[inline]
    pub fn next_positions(&self) -> &[[f32; 3]] {
        &self.next_positions
    }

    #[inline]
    pub fn directions(&self) -> &[[f32; 3]] {
        &self.directions
    }

    #[inline]
    pub fn arc_lengths(&self) -> &[[f32; 4]] {
        &self.arc_lengths
    }

    #[inline]
    pub fn join_flags(&self) -> &[u32] {
        &self.join_flags
    }

    #[inline]
    pub fn offsets(&self) -> &Arc<[[f32; 2]]> {
        &self.offsets
    }

    #[inline]
    pub fn indices(&self) -> &Arc<[u32]> {
        &self.indices
    }
}

fn validate_points(points: &[Vec3]) -> Result<(), StrokeError> {
    let distinct = points
        .windows(2)
        .any(|pair| pair[0].distance(pair[1]) > DEGENERATE_EPS);
    if points.len() < 2 || !distinct {
        return Err(StrokeError::Construction {
            count: points.len(),
        });
    }
    Ok(())
}

fn topology(real_segments: usize, segments: usize) -> (Arc<[[f32; 2]]>, Arc<[u32]>) {
    let mut offsets = Vec::with_capacity(segments * 4);
    let mut indices = Vec::with_capacity(segments * 6);
    for segment in 0..segments {
        let normal_scale = if segment < real_segments {
            1.0
        } else {
            ARROW_NORMAL_SCALE
        };
        offsets.extend(
            CORNERS
                .iter()
                .map(|&[tangential, normal]| [tangential, normal * normal_scale]),
        );
        let base = (segment * 4) as u32;
        indices.extend(QUAD_INDICES.iter().map(|&i| base + i));
    }
    (offsets.into(), indices.into())
}

/// Unit direction per segment; degenerate segments borrow the direction of the nearest
/// non-degenerate segment, preferring the preceding one on ties.
fn segment_directions(points: &[Vec3]) -> Vec<Vec3> {
    let raw = points
        .windows(2)
        .map(|pair| {
            let d = pair[1] - pair[0];
            let len = d.length();
            (len > DEGENERATE_EPS).then(|| d / len)
        })
        .collect::<Vec<_>>();

    let degenerate = raw.iter().filter(|d| d.is_none()).count();
    if degenerate > 0 {
        log::debug!("stroke geometry: {degenerate} zero-length segment(s), borrowing neighbour directions");
    }

    (0..raw.len())
        .map(|i| {
            raw[i].unwrap_or_else(|| {
                (1..raw.len())
                    .find_map(|step| {
                        let before = i.checked_sub(step).and_then(|j| raw[j]);
                        let after = raw.get(i + step).copied().flatten();
                        before.or(after)
                    })
                    .unwrap_or(Vec3::X)
            })
        })
        .collect()
}
