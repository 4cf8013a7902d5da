use crate::geometry::JoinType;
use crate::math::intersect_2d::line_line_point;
use crate::math::{arc_subdivision_count, cross, left_normal, turn_angle, Point2, Vector2, EPSILON};

/// When `cos(angle between consecutive segments) < this`, use a flat cap
/// instead of a join. Only for near-180° reversals (> ~169°).
const FLAT_CAP_COS: f64 = -0.98;

/// Sine below which two consecutive segments are treated as straight.
const STRAIGHT_SIN: f64 = 1e-9;

/// Parameters shared by every corner of one side.
#[derive(Debug, Clone, Copy)]
pub(super) struct SideParams {
    /// Signed distance: positive offsets to the left of the walking direction.
    pub distance: f64,
    pub join: JoinType,
    /// Maximum miter length as a multiple of `|distance|`.
    pub miter_limit: f64,
    /// Chord error bound for round joins.
    pub tolerance: f64,
}

/// One offset side and what happened at its corners.
#[derive(Debug, Clone, Default)]
pub(super) struct SideOffset {
    pub points: Vec<Point2>,
    /// Outer miters that exceeded the limit and were bevelled instead.
    pub miters_clipped: usize,
    pub flat_caps: usize,
}

/// Builds one side of an offset.
///
/// `points` must be free of zero-length segments (including the closing
/// segment when `closed`). Each segment is shifted along its left normal,
/// then consecutive shifted segments are joined. Inner corners always meet
/// at the line intersection; outer corners use the requested join.
pub(super) fn offset_side(points: &[Point2], closed: bool, params: SideParams) -> SideOffset {
    let n = points.len();
    let segment_count = if closed { n } else { n - 1 };

    let mut segments: Vec<(Point2, Point2)> = Vec::with_capacity(segment_count);
    let mut directions: Vec<Vector2> = Vec::with_capacity(segment_count);
    for i in 0..segment_count {
        let j = (i + 1) % n;
        let d = points[j] - points[i];
        let dir = d / d.norm().max(EPSILON);
        let shift = left_normal(&dir) * params.distance;
        segments.push((points[i] + shift, points[j] + shift));
        directions.push(dir);
    }

    let mut side = SideOffset {
        points: Vec::with_capacity(n * 2),
        ..SideOffset::default()
    };

    if closed {
        for i in 0..segment_count {
            let prev = if i == 0 { segment_count - 1 } else { i - 1 };
            push_corner(
                &mut side,
                &segments[prev],
                &segments[i],
                &directions[prev],
                &directions[i],
                &points[i],
                params,
            );
        }
    } else {
        side.points.push(segments[0].0);
        for i in 1..n - 1 {
            push_corner(
                &mut side,
                &segments[i - 1],
                &segments[i],
                &directions[i - 1],
                &directions[i],
                &points[i],
                params,
            );
        }
        side.points.push(segments[segment_count - 1].1);
    }

    side
}

/// Pushes the point(s) joining `seg_prev` to `seg_next` around `corner`.
fn push_corner(
    side: &mut SideOffset,
    seg_prev: &(Point2, Point2),
    seg_next: &(Point2, Point2),
    dir_prev: &Vector2,
    dir_next: &Vector2,
    corner: &Point2,
    params: SideParams,
) {
    let cos_angle = dir_prev.dot(dir_next);
    if cos_angle < FLAT_CAP_COS {
        side.points.push(seg_prev.1);
        side.points.push(seg_next.0);
        side.flat_caps += 1;
        return;
    }

    if cross(dir_prev, dir_next).abs() < STRAIGHT_SIN {
        side.points.push(seg_prev.1);
        return;
    }

    let miter = line_line_point(&seg_prev.1, dir_prev, &seg_next.0, dir_next).unwrap_or(seg_prev.1);

    // A left turn puts the left side on the inside of the corner.
    let turn = turn_angle(dir_prev, dir_next);
    let is_outer = turn * params.distance < 0.0;
    if !is_outer {
        side.points.push(miter);
        return;
    }

    match params.join {
        JoinType::Miter => {
            let limit = params.miter_limit * params.distance.abs();
            if (miter - corner).norm() > limit {
                side.points.push(seg_prev.1);
                side.points.push(seg_next.0);
                side.miters_clipped += 1;
            } else {
                side.points.push(miter);
            }
        }
        JoinType::Bevel => {
            side.points.push(seg_prev.1);
            side.points.push(seg_next.0);
        }
        JoinType::Round => push_arc(side, corner, &seg_prev.1, turn, params),
    }
}

/// Arc of radius `|distance|` around `corner`, from `start` through the turn.
fn push_arc(side: &mut SideOffset, corner: &Point2, start: &Point2, turn: f64, params: SideParams) {
    let radius = params.distance.abs();
    let start_angle = (start.y - corner.y).atan2(start.x - corner.x);
    let steps = arc_subdivision_count(radius, turn.abs(), params.tolerance);
    for k in 0..=steps {
        #[allow(clippy::cast_precision_loss)]
        let angle = start_angle + turn * (k as f64 / steps as f64);
        side.points.push(Point2::new(
            corner.x + radius * angle.cos(),
            corner.y + radius * angle.sin(),
        ));
    }
}
