//! Minimal animation timeline for `Scene`.
//!
//! Tracks drive stroke style properties through `Shape::restyle`, so every animated frame goes
//! through the same validation as a manual restyle:
//! - `Opacity` (fade in/out, also fades the fill)
//! - `Width`
//! - `StartProportion` / `EndProportion` (the classic "create" animation is `EndProportion` 0 -> 1)
//! - `DashOffset` (static dash phase; `dash_speed` covers continuous marching)
//!
//! Usage sketch:
//! ```ignore
//! use scribe::anim::{AnimTarget, Ease, Keyframe, Timeline, Track};
//! let mut tl = Timeline::new();
//! tl.add_track(Track::new_end_proportion(AnimTarget::Name("curve".into()))
//!     .with_keyframes(vec![
//!         Keyframe::at(0.0, 0.0).ease(Ease::InOutCubic),
//!         Keyframe::at(1.5, 1.0),
//!     ]));
//! ```
//!
//! Then in your render loop per frame:
//! ```ignore
//! scene.step(&tl, t, dt, &ctx);
//! ```

use std::collections::BTreeMap;

use crate::scene::Scene;
use crate::stroke::{StrokeError, StyleUpdate};

/// How to map animation time into a normalized [0,1] parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
}

impl Ease {
    #[inline]
    pub fn sample(self, x: f32) -> f32 {
        let t = x.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::InQuad => t * t,
            Ease::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Ease::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) * 0.5
                }
            }
            Ease::InCubic => t * t * t,
            Ease::OutCubic => 1.0 - (1.0 - t).powi(3),
            Ease::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) * 0.5
                }
            }
            Ease::InQuart => t.powi(4),
            Ease::OutQuart => 1.0 - (1.0 - t).powi(4),
            Ease::InOutQuart => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) * 0.5
                }
            }
        }
    }
}

/// Identifies which shape in the scene to animate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimTarget {
    Name(String),
}

impl AnimTarget {
    #[inline]
    fn name(&self) -> &str {
        match self {
            AnimTarget::Name(name) => name,
        }
    }
}

/// A keyframe in seconds with a scalar value.
///
/// `ease` shapes the interpolation from this keyframe to the next one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Keyframe {
    pub time_s: f32,
    pub value: f32,
    pub ease: Ease,
}

impl Keyframe {
    #[inline]
    pub fn at(time_s: f32, value: f32) -> Self {
        Self {
            time_s: time_s.max(0.0),
            value,
            ease: Ease::Linear,
        }
    }

    #[inline]
    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }
}

/// Interpolate a scalar track across keyframes (sorted by time).
fn sample_keyframes(frames: &[Keyframe], t_s: f32) -> Option<f32> {
    let (first, rest) = frames.split_first()?;
    if t_s <= first.time_s || rest.is_empty() {
        return Some(first.value);
    }

    let mut prev = *first;
    for next in rest {
        if t_s < next.time_s {
            let dt = (next.time_s - prev.time_s).max(1e-6);
            let u = (t_s - prev.time_s) / dt;
            let k = prev.ease.sample(u);
            return Some(lerp(prev.value, next.value, k));
        }
        prev = *next;
    }

    // Past end: hold last value.
    Some(prev.value)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Which stroke style property a track drives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Property {
    Opacity,
    Width,
    StartProportion,
    EndProportion,
    DashOffset,
}

impl Property {
    /// Fold a sampled value into `update`. Proportions and opacity are clamped to `[0, 1]`,
    /// widths to non-negative values.
    fn write(self, value: f32, update: &mut StyleUpdate) {
        match self {
            Property::Opacity => update.opacity = Some(value.clamp(0.0, 1.0)),
            Property::Width => update.width = Some(value.max(0.0)),
            Property::StartProportion => update.start_proportion = Some(value.clamp(0.0, 1.0)),
            Property::EndProportion => update.end_proportion = Some(value.clamp(0.0, 1.0)),
            Property::DashOffset => update.dash_offset = Some(value),
        }
    }
}

/// One animation track applies one property to one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub target: AnimTarget,
    pub property: Property,
    keyframes: Vec<Keyframe>,
}

impl Track {
    pub fn new(target: AnimTarget, property: Property) -> Self {
        Self {
            target,
            property,
            keyframes: Vec::new(),
        }
    }

    pub fn new_opacity(target: AnimTarget) -> Self {
        Self::new(target, Property::Opacity)
    }

    pub fn new_width(target: AnimTarget) -> Self {
        Self::new(target, Property::Width)
    }

    pub fn new_start_proportion(target: AnimTarget) -> Self {
        Self::new(target, Property::StartProportion)
    }

    pub fn new_end_proportion(target: AnimTarget) -> Self {
        Self::new(target, Property::EndProportion)
    }

    pub fn new_dash_offset(target: AnimTarget) -> Self {
        Self::new(target, Property::DashOffset)
    }

    pub fn with_keyframes(mut self, mut keyframes: Vec<Keyframe>) -> Self {
        // Keep deterministic ordering.
        keyframes.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        self.keyframes = keyframes;
        self
    }

    #[inline]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    #[inline]
    pub fn sample(&self, t_s: f32) -> Option<f32> {
        sample_keyframes(&self.keyframes, t_s)
    }

    pub fn bounds(&self) -> Option<(f32, f32)> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        Some((first.time_s, last.time_s))
    }
}

/// A timeline holds multiple tracks. Tracks are evaluated independently at time t.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    pub tracks: Vec<Track>,
}

impl Timeline {
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    pub fn add_track(&mut self, track: Track) -> &mut Self {
        self.tracks.push(track);
        self
    }

    /// Compute the time bounds of the whole timeline.
    pub fn bounds(&self) -> Option<(f32, f32)> {
        self.tracks
            .iter()
            .filter_map(Track::bounds)
            .reduce(|(s0, e0), (s1, e1)| (s0.min(s1), e0.max(e1)))
    }

    /// Sampled style updates per target name. When several tracks drive the same property of
    /// the same target, the later track wins.
    pub fn sample(&self, t_s: f32) -> BTreeMap<&str, StyleUpdate> {
        let mut updates: BTreeMap<&str, StyleUpdate> = BTreeMap::new();
        for track in &self.tracks {
            let Some(value) = track.sample(t_s) else {
                continue;
            };
            let update = updates.entry(track.target.name()).or_default();
            track.property.write(value, update);
        }
        updates
    }

    /// Apply this timeline to the scene at time `t_s`.
    ///
    /// Targets that are not in the scene are skipped. Every update is checked before any is
    /// applied, so an invalid one leaves the whole scene untouched and is returned.
    pub fn apply(&self, scene: &mut Scene, t_s: f32) -> Result<(), StrokeError> {
        let updates = self.sample(t_s);
        for (name, update) in &updates {
            if let Some(shape) = scene.get(name) {
                shape.check_restyle(update)?;
            }
        }

        for (name, update) in updates {
            let Some(shape) = scene.get_mut(name) else {
                continue;
            };
            shape.restyle(update)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::viewport::{RenderContext, ViewportConfig};
    use crate::scene::Shape;
    use crate::stroke::StrokeStyle;
    use glam::{Vec2, Vec3};

    fn ctx() -> RenderContext {
        RenderContext::new(ViewportConfig::default(), Vec2::new(800.0, 800.0), 1.0)
    }

    fn scene_with(name: &str) -> Scene {
        let mut scene = Scene::new();
        scene.add(
            Shape::polyline(name, &[Vec3::ZERO, Vec3::X * 2.0], StrokeStyle::default(), &ctx())
                .unwrap(),
        );
        scene
    }

    fn target(name: &str) -> AnimTarget {
        AnimTarget::Name(name.to_string())
    }

    #[test]
    fn eases_hit_endpoints() {
        for ease in [Ease::Linear, Ease::InOutQuad, Ease::OutCubic, Ease::InOutQuart] {
            assert_eq!(ease.sample(0.0), 0.0);
            assert!((ease.sample(1.0) - 1.0).abs() < 1e-6);
            assert_eq!(ease.sample(-3.0), 0.0);
        }
        assert!((Ease::InOutCubic.sample(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn keyframes_hold_outside_range() {
        let track = Track::new_width(target("a")).with_keyframes(vec![
            Keyframe::at(2.0, 0.5),
            Keyframe::at(1.0, 0.1),
        ]);
        assert_eq!(track.bounds(), Some((1.0, 2.0)));
        assert_eq!(track.sample(0.0), Some(0.1));
        assert!((track.sample(1.5).unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(track.sample(9.0), Some(0.5));
        assert_eq!(Track::new_width(target("a")).sample(1.0), None);
    }

    #[test]
    fn create_animation_drives_end_proportion() {
        let mut scene = scene_with("line");
        let mut tl = Timeline::new();
        tl.add_track(
            Track::new_end_proportion(target("line"))
                .with_keyframes(vec![Keyframe::at(0.0, 0.0), Keyframe::at(1.0, 1.0)]),
        );
        tl.add_track(Track::new_opacity(target("missing")).with_keyframes(vec![Keyframe::at(0.0, 0.0)]));

        assert!(scene.step(&tl, 0.25, 0.016, &ctx()));
        let stroke = scene.get("line").unwrap().stroke();
        assert_eq!(stroke.style().end_proportion, 0.25);
        assert_eq!(stroke.params().trim, [0.0, 0.5]);

        assert!(scene.step(&tl, 0.0, 0.016, &ctx()));
        assert!(scene.get("line").unwrap().stroke().params().trim_is_empty());
    }

    #[test]
    fn later_tracks_win_and_merge() {
        let mut tl = Timeline::new();
        tl.add_track(Track::new_opacity(target("a")).with_keyframes(vec![Keyframe::at(0.0, 0.2)]));
        tl.add_track(Track::new_width(target("a")).with_keyframes(vec![Keyframe::at(0.0, 0.1)]));
        tl.add_track(Track::new_opacity(target("a")).with_keyframes(vec![Keyframe::at(0.0, 0.7)]));
        let updates = tl.sample(0.0);
        assert_eq!(updates["a"].opacity, Some(0.7));
        assert_eq!(updates["a"].width, Some(0.1));
        assert_eq!(tl.bounds(), Some((0.0, 0.0)));
    }

    #[test]
    fn invalid_frame_is_aborted() {
        let mut scene = scene_with("line");
        let mut tl = Timeline::new();
        tl.add_track(Track::new_start_proportion(target("line")).with_keyframes(vec![Keyframe::at(0.0, 0.8)]));
        tl.add_track(Track::new_end_proportion(target("line")).with_keyframes(vec![Keyframe::at(0.0, 0.2)]));

        assert!(!scene.step(&tl, 0.0, 0.016, &ctx()));
        let style = scene.get("line").unwrap().stroke().style();
        assert_eq!((style.start_proportion, style.end_proportion), (0.0, 1.0));
    }

    #[test]
    fn invalid_target_leaves_other_targets_untouched() {
        let mut scene = scene_with("a");
        scene.add(
            Shape::polyline("b", &[Vec3::ZERO, Vec3::Y], StrokeStyle::default(), &ctx()).unwrap(),
        );
        let mut tl = Timeline::new();
        // "a" sorts first and is valid on its own; "b" gets start > end.
        tl.add_track(Track::new_width(target("a")).with_keyframes(vec![Keyframe::at(0.0, 0.3)]));
        tl.add_track(Track::new_start_proportion(target("b")).with_keyframes(vec![Keyframe::at(0.0, 0.9)]));
        tl.add_track(Track::new_end_proportion(target("b")).with_keyframes(vec![Keyframe::at(0.0, 0.1)]));

        assert!(matches!(
            tl.apply(&mut scene, 0.0),
            Err(StrokeError::Proportion { .. })
        ));
        assert_eq!(
            scene.get("a").unwrap().stroke().style().width,
            StrokeStyle::default().width
        );
    }
}
