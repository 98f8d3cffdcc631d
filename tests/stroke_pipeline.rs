//! End-to-end checks through the public stroke API and the software rasterizer.
//!
//! Every test uses an 800x800 context framing 8 world units, so one world unit is 100 px and
//! the world origin lands on pixel (400, 400).

use glam::{Vec2, Vec3};
use scribe::stroke::coverage::{self, DiscardReason, Verdict};
use scribe::stroke::{CoverageMask, DashAtlas, DashKind};
use scribe::{ArrowStyle, RenderContext, Stroke, StrokeError, StrokeStyle, StyleUpdate, ViewportConfig};

const SIZE: usize = 800;

fn context() -> RenderContext {
    RenderContext::new(ViewportConfig::default(), Vec2::splat(SIZE as f32), 1.0)
}

fn corner() -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
    ]
}

fn raster(stroke: &Stroke) -> CoverageMask {
    let mut mask = CoverageMask::new(SIZE, SIZE);
    stroke.rasterize(&mut mask);
    mask
}

fn approx(a: Vec3, b: Vec3) -> bool {
    a.distance(b) < 1e-5
}

#[test]
fn corner_stroke_end_to_end() {
    let ctx = context();
    let stroke = Stroke::new(&corner(), StrokeStyle::default().with_width(1.0), &ctx).unwrap();

    assert_eq!(stroke.num_points(), 3);
    assert!((stroke.length() - 2.0).abs() < 1e-6);
    assert_eq!(stroke.geometry().num_real_segments(), 2);
    assert_eq!(stroke.geometry().num_vertices(), 8);
    assert_eq!(stroke.geometry().indices().len(), 12);
    assert!((stroke.params().half_width_px - 50.0).abs() < 1e-4);

    let screen = ctx.project(Vec3::new(1.0, 0.0, 0.0));
    assert!((screen - Vec2::new(500.0, 400.0)).length() < 1e-3);

    let mask = raster(&stroke);
    assert!(mask.covered_pixels() > 0);
    assert_eq!(mask.overdrawn_pixels(), 0);
}

#[test]
fn arc_lengths_sum_segment_distances() {
    let ctx = context();
    let points = vec![
        Vec3::new(-2.0, -1.0, 0.0),
        Vec3::new(0.5, 0.25, 0.0),
        Vec3::new(1.0, 2.0, 0.0),
        Vec3::new(3.0, 2.0, 0.0),
    ];
    let stroke = Stroke::new(&points, StrokeStyle::default(), &ctx).unwrap();

    let expected: f32 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    assert!((stroke.length() - expected).abs() < 1e-4);

    let geometry = stroke.geometry();
    for i in 0..geometry.num_real_segments() {
        let segment = geometry.segment(i).unwrap();
        let along = segment.start.distance(segment.end);
        assert!((segment.arc_end() - segment.arc_start() - along).abs() < 1e-4);
        assert!((segment.arc_start() - geometry.arc_length_at(i).unwrap()).abs() < 1e-6);
    }
}

#[test]
fn joins_are_rounded_and_drawn_once() {
    let ctx = context();
    let stroke = Stroke::new(&corner(), StrokeStyle::default().with_width(1.0), &ctx).unwrap();
    let mask = raster(&stroke);

    // The corner at (1, 0) sits on pixel (500, 400); the outer side of the turn is down-right.
    assert_eq!(mask.hits(500, 400), 1);
    assert_eq!(mask.hits(535, 365), 1);
    assert!(!mask.is_covered(540, 360));

    // Rounded start cap around (400, 400).
    assert!(mask.is_covered(360, 370));
    assert!(!mask.is_covered(355, 360));
}

#[test]
fn closed_seam_is_drawn_once() {
    let ctx = context();
    let square = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(-1.0, -1.0, 0.0),
    ];
    let stroke = Stroke::new(&square, StrokeStyle::default().with_width(0.2), &ctx).unwrap();
    assert!(stroke.geometry().is_closed());

    let mask = raster(&stroke);
    assert_eq!(mask.overdrawn_pixels(), 0);
    // The seam vertex and its outer corner.
    assert_eq!(mask.hits(300, 300), 1);
    assert_eq!(mask.hits(294, 294), 1);
}

#[test]
fn trim_window_limits_coverage() {
    let ctx = context();
    let line = [Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
    let style = StrokeStyle::default().with_width(0.1).with_proportions(0.25, 0.75);
    let stroke = Stroke::new(&line, style, &ctx).unwrap();

    assert!((stroke.length() - 4.0).abs() < 1e-6);
    assert_eq!(stroke.params().trim, [1.0, 3.0]);

    // Arc length 0.5 is x = -1.5, pixel 250.
    let segment = stroke.geometry().segment(0).unwrap();
    assert_eq!(
        coverage::shade(Vec2::new(250.5, 400.5), &segment, stroke.params(), None),
        Verdict::Discarded(DiscardReason::Trimmed)
    );

    let mask = raster(&stroke);
    assert!(!mask.is_covered(250, 400));
    assert!(mask.is_covered(400, 400));
    // Trimmed ends are rounded: arc length 1 is pixel 300, half width is 5 px.
    assert!(mask.is_covered(297, 400));
    assert!(!mask.is_covered(293, 400));
    assert!(!mask.is_covered(297, 404));
}

#[test]
fn empty_trim_hides_the_stroke() {
    let ctx = context();
    let style = StrokeStyle::default().with_width(0.5).with_proportions(0.4, 0.4);
    let stroke = Stroke::new(&corner(), style, &ctx).unwrap();

    assert!(stroke.params().trim_is_empty());
    assert_eq!(raster(&stroke).covered_pixels(), 0);
}

#[test]
fn dash_gaps_follow_the_phase() {
    let mut ctx = context();
    let line = [Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)];
    let style = StrokeStyle::default()
        .with_width(0.1)
        .with_dash(vec![1.0, 1.0])
        .with_dash_speed(1.0);
    let mut stroke = Stroke::new(&line, style, &ctx).unwrap();

    // Arc 0.5 is in the first dash, arc 1.5 in the first gap, arc 2.5 in the second dash.
    let mask = raster(&stroke);
    assert!(mask.is_covered(150, 400));
    assert!(!mask.is_covered(250, 400));
    assert!(mask.is_covered(350, 400));

    ctx.resize(Vec2::splat(SIZE as f32));
    stroke.update(1.0, &ctx);
    assert!((stroke.dash_phase() - 1.0).abs() < 1e-6);

    let mask = raster(&stroke);
    assert!(!mask.is_covered(150, 400));
    assert!(mask.is_covered(250, 400));
    assert!(!mask.is_covered(350, 400));
    assert_eq!(mask.overdrawn_pixels(), 0);
}

#[test]
fn dash_atlas_matches_pattern_periods() {
    let simple = DashAtlas::build(&[1.0, 1.0]).unwrap();
    assert_eq!(simple.period(), 2.0);
    assert_eq!(simple.rows()[0].kind, DashKind::DashStart);
    assert_eq!(simple.rows()[64].kind, DashKind::DashBody);

    let uneven = DashAtlas::build(&[1.0, 2.0, 3.0, 0.0]).unwrap();
    assert_eq!(uneven.period(), 6.0);
    assert_eq!(uneven.rows().len(), DashAtlas::SAMPLES);
}

#[test]
fn arrow_tip_follows_end_proportion() {
    let ctx = context();
    let style = StrokeStyle::default()
        .with_proportions(0.0, 0.5)
        .with_arrow(ArrowStyle::default());
    let mut stroke = Stroke::new(&corner(), style, &ctx).unwrap();

    let geometry = stroke.geometry();
    assert_eq!(geometry.num_arrow_segments(), 1);
    let arrow = geometry.arrow().unwrap();
    assert!(approx(arrow.tip, Vec3::new(1.0, 0.0, 0.0)));

    // Half way along the second segment.
    stroke
        .restyle(StyleUpdate {
            end_proportion: Some(0.75),
            ..Default::default()
        })
        .unwrap();
    let arrow = stroke.geometry().arrow().unwrap();
    assert_eq!(arrow.segment, 1);
    assert!(approx(arrow.tip, Vec3::new(1.0, 0.5, 0.0)));
    assert!(approx(arrow.direction, Vec3::Y));
}

#[test]
fn arrowhead_replaces_the_body_end() {
    let ctx = context();
    let line = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
    let style = StrokeStyle::default().with_arrow(ArrowStyle::default());
    let stroke = Stroke::new(&line, style, &ctx).unwrap();

    // Body stops at the arrow base, arc 0.75.
    assert!((stroke.params().trim[1] - 0.75).abs() < 1e-6);

    let mask = raster(&stroke);
    // Just behind the tip at pixel 500 only the arrowhead covers.
    assert_eq!(mask.hits(495, 400), 1);
    assert_eq!(mask.hits(480, 405), 1);
    assert!(!mask.is_covered(495, 405));
    assert!(!mask.is_covered(505, 400));
}

#[test]
fn invalid_input_is_rejected() {
    let ctx = context();

    assert!(matches!(
        Stroke::new(&[Vec3::ZERO], StrokeStyle::default(), &ctx),
        Err(StrokeError::Construction { count: 1 })
    ));
    assert!(matches!(
        Stroke::new(&[Vec3::ONE, Vec3::ONE], StrokeStyle::default(), &ctx),
        Err(StrokeError::Construction { .. })
    ));
    assert!(matches!(
        Stroke::new(&corner(), StrokeStyle::default().with_dash(vec![1.0, 1.0, 1.0]), &ctx),
        Err(StrokeError::Pattern { .. })
    ));
    assert!(matches!(
        Stroke::new(&corner(), StrokeStyle::default().with_proportions(0.8, 0.2), &ctx),
        Err(StrokeError::Proportion { .. })
    ));
}

#[test]
fn point_updates_reuse_or_reallocate_buffers() {
    let ctx = context();
    let mut stroke = Stroke::new(&corner(), StrokeStyle::default(), &ctx).unwrap();
    let indices = stroke.geometry().indices().clone();

    let moved = vec![
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::new(1.5, 0.0, 0.0),
        Vec3::new(1.0, 2.0, 0.0),
    ];
    stroke.set_points(&moved).unwrap();
    assert!(std::sync::Arc::ptr_eq(&indices, stroke.geometry().indices()));

    let positions = stroke.geometry().positions().to_vec();
    let arcs = stroke.geometry().arc_lengths().to_vec();
    stroke.set_points(&moved).unwrap();
    assert_eq!(stroke.geometry().positions(), &positions[..]);
    assert_eq!(stroke.geometry().arc_lengths(), &arcs[..]);

    let mut longer = moved.clone();
    longer.push(Vec3::new(2.0, 2.0, 0.0));
    stroke.set_points(&longer).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&indices, stroke.geometry().indices()));
    assert_eq!(stroke.geometry().num_vertices(), 12);
}

#[test]
fn dash_crossing_a_join_stays_whole() {
    let ctx = context();
    let style = StrokeStyle::default().with_width(0.1).with_dash(vec![0.98, 1.0]);
    let stroke = Stroke::new(&corner(), style, &ctx).unwrap();
    let mask = raster(&stroke);

    // Arc 0.955 on the first segment is inside the dash; the second segment sees arc 1.045
    // there, which is in the gap, so the first segment must still draw it.
    assert_eq!(mask.hits(495, 404), 1);
    assert_eq!(mask.hits(500, 400), 1);
    assert!(mask.is_covered(450, 400));
    assert!(!mask.is_covered(500, 440));
    assert_eq!(mask.overdrawn_pixels(), 0);
}

#[test]
fn dashed_closed_seam_is_drawn_once() {
    let ctx = context();
    let square = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(-1.0, -1.0, 0.0),
    ];
    let style = StrokeStyle::default().with_width(0.2).with_dash(vec![0.5, 0.5]);
    let stroke = Stroke::new(&square, style, &ctx).unwrap();
    let mask = raster(&stroke);

    assert_eq!(mask.overdrawn_pixels(), 0);
    assert_eq!(mask.hits(300, 300), 1);
    assert!(mask.is_covered(325, 300));
    assert!(!mask.is_covered(375, 300));
}

#[test]
fn arrowhead_keeps_its_shape_when_zooming() {
    let mut ctx = context();
    let line = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
    let style = StrokeStyle::default().with_width(0.1).with_arrow(ArrowStyle::default());
    let mut stroke = Stroke::new(&line, style, &ctx).unwrap();

    // 100 px per unit: tip at 500, base at 475, half width 10 px.
    let mask = raster(&stroke);
    assert!(mask.is_covered(480, 406));
    assert!(!mask.is_covered(480, 410));

    // Doubling the zoom doubles the arrowhead in both directions; the body keeps its width.
    ctx.camera.zoom *= 2.0;
    stroke.update(0.0, &ctx);
    assert_eq!(stroke.params().frame.pixels_per_unit, 100.0);

    let mask = raster(&stroke);
    assert_eq!(mask.hits(555, 415), 1);
    assert!(!mask.is_covered(555, 420));
    assert!(mask.is_covered(500, 404));
    assert!(!mask.is_covered(500, 406));
}
