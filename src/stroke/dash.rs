//! Dash atlas.
//!
//! A dash pattern is an even-length list of run lengths (`on, off, on, off, ...`). Classifying a
//! point along a stroke against the pattern is a search over run boundaries, which is too much
//! work per fragment. Instead we precompute, for `N` evenly spaced samples across one period, the
//! nearest run boundary and the dash interval it belongs to. At shading time the arc-length
//! offset is wrapped into the period and the nearest sample is read back in O(1).
//!
//! Row layout (also the GPU texel layout, see `texels`):
//! - `boundary`: position of the nearest on-run start or end
//! - `kind`: where the sample sits relative to that dash
//! - `dash_start`, `dash_end`: the containing on-run, possibly shifted by one period so that
//!   samples near the wrap point refer to the neighbouring period's dash

use super::StrokeError;

/// Classification of an atlas sample relative to its nearest dash.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum DashKind {
    /// At or before the dash's start boundary.
    DashStart = 0,
    /// Strictly inside the dash's run.
    DashBody = 1,
    /// At or after the dash's end boundary.
    DashEnd = 2,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DashRow {
    pub boundary: f32,
    pub kind: DashKind,
    pub dash_start: f32,
    pub dash_end: f32,
}

impl DashRow {
    #[inline]
    fn shifted(self, by: f32) -> Self {
        Self {
            boundary: self.boundary + by,
            dash_start: self.dash_start + by,
            dash_end: self.dash_end + by,
            ..self
        }
    }

    /// Distance along the stroke from `offset` to the dash this row describes; zero inside it.
    ///
    /// `offset` must be expressed in the same period as the row (see `DashAtlas::lookup`).
    #[inline]
    pub fn distance_along(&self, offset: f32) -> f32 {
        match self.kind {
            DashKind::DashStart if offset <= self.dash_start => self.dash_start - offset,
            DashKind::DashEnd if offset >= self.dash_end => offset - self.dash_end,
            // Nearest-sample lookup can hand back a neighbouring row; fall back to the
            // interval itself.
            _ => {
                if offset < self.dash_start {
                    self.dash_start - offset
                } else if offset > self.dash_end {
                    offset - self.dash_end
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashAtlas {
    pattern: Vec<f32>,
    period: f32,
    rows: Vec<DashRow>,
}

impl DashAtlas {
    /// Default number of samples across one period.
    pub const SAMPLES: usize = 256;

    pub fn build(pattern: &[f32]) -> Result<Self, StrokeError> {
        Self::build_with_samples(pattern, Self::SAMPLES)
    }

    /// Build an atlas with an explicit sample count.
    ///
    /// Errors with `StrokeError::Pattern` when the pattern is empty, has an odd number of runs,
    /// contains a negative or non-finite run, or sums to zero.
    pub fn build_with_samples(pattern: &[f32], samples: usize) -> Result<Self, StrokeError> {
        let invalid = || StrokeError::Pattern {
            pattern: pattern.to_vec(),
        };

        if samples == 0 || pattern.is_empty() || pattern.len() % 2 != 0 {
            return Err(invalid());
        }
        if pattern.iter().any(|run| !run.is_finite() || *run < 0.0) {
            return Err(invalid());
        }

        let period: f32 = pattern.iter().sum();
        if period <= 0.0 || !period.is_finite() {
            return Err(invalid());
        }

        let boundaries = boundaries(pattern, period);
        let rows = (0..samples)
            .map(|j| classify(j as f32 / samples as f32 * period, &boundaries))
            .collect::<Vec<_>>();

        log::debug!(
            "dash atlas: {} runs, period {period}, {samples} samples",
            pattern.len()
        );

        Ok(Self {
            pattern: pattern.to_vec(),
            period,
            rows,
        })
    }

    #[inline]
    pub fn pattern(&self) -> &[f32] {
        &self.pattern
    }

    #[inline]
    pub fn period(&self) -> f32 {
        self.period
    }

    #[inline]
    pub fn rows(&self) -> &[DashRow] {
        &self.rows
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.rows.len()
    }

    /// Reduce `offset` into `[0, period)`.
    #[inline]
    pub fn wrap(&self, offset: f32) -> f32 {
        let wrapped = offset.rem_euclid(self.period);
        // `rem_euclid` can round up to exactly `period` for tiny negative inputs.
        if wrapped >= self.period { 0.0 } else { wrapped }
    }

    /// Nearest-sample lookup for an offset in pattern units.
    ///
    /// Returns the wrapped offset together with its row; both share one coordinate frame, so
    /// `row.distance_along(wrapped)` is meaningful even right before the wrap point.
    pub fn lookup(&self, offset: f32) -> (f32, DashRow) {
        let n = self.rows.len();
        let mut wrapped = self.wrap(offset);
        let mut index = (wrapped / self.period * n as f32).round() as usize;
        if index >= n {
            // Closest sample is the first one of the next period.
            index = 0;
            wrapped -= self.period;
        }
        (wrapped, self.rows[index])
    }

    /// Rows packed as `[boundary, kind, dash_start, dash_end]` for an RGBA32F texture.
    pub fn texels(&self) -> Vec<[f32; 4]> {
        self.rows
            .iter()
            .map(|row| {
                [
                    row.boundary,
                    row.kind as u32 as f32,
                    row.dash_start,
                    row.dash_end,
                ]
            })
            .collect()
    }
}

#[derive(Debug, Copy, Clone)]
struct Boundary {
    position: f32,
    dash_start: f32,
    dash_end: f32,
}

/// On-run start/end boundaries in scan order, padded by the last dash of the previous period and
/// the first dash of the next one.
fn boundaries(pattern: &[f32], period: f32) -> Vec<Boundary> {
    let mut dashes = Vec::with_capacity(pattern.len() / 2);
    let mut cursor = 0.0f32;
    for pair in pattern.chunks_exact(2) {
        dashes.push((cursor, cursor + pair[0]));
        cursor += pair[0] + pair[1];
    }

    let (Some(&first), Some(&last)) = (dashes.first(), dashes.last()) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(dashes.len() * 2 + 4);
    let wrapped = std::iter::once((last.0 - period, last.1 - period))
        .chain(dashes.iter().copied())
        .chain(std::iter::once((first.0 + period, first.1 + period)));
    for (start, end) in wrapped {
        for position in [start, end] {
            out.push(Boundary {
                position,
                dash_start: start,
                dash_end: end,
            });
        }
    }
    out
}

fn classify(x: f32, boundaries: &[Boundary]) -> DashRow {
    let mut nearest = boundaries[0];
    let mut best = (x - nearest.position).abs();
    for b in &boundaries[1..] {
        let d = (x - b.position).abs();
        // Strict comparison keeps the first boundary on ties.
        if d < best {
            best = d;
            nearest = *b;
        }
    }

    let kind = if x <= nearest.dash_start {
        DashKind::DashStart
    } else if x >= nearest.dash_end {
        DashKind::DashEnd
    } else {
        DashKind::DashBody
    };

    DashRow {
        boundary: nearest.position,
        kind,
        dash_start: nearest.dash_start,
        dash_end: nearest.dash_end,
    }
}
