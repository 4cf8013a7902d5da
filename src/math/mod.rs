pub mod distance_2d;
pub mod intersect_2d;
pub mod polygon_2d;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Guard against division by (near) zero. Not a geometric tolerance:
/// every geometric predicate takes the caller's tolerance explicitly.
pub const EPSILON: f64 = 1e-12;

/// 2D cross product (z component of the 3D cross product).
#[must_use]
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Returns the left-pointing normal of a direction vector.
#[must_use]
pub fn left_normal(dir: &Vector2) -> Vector2 {
    Vector2::new(-dir.y, dir.x)
}

/// Normalized direction from `a` to `b`, or `None` for a segment shorter than `min_len`.
#[must_use]
pub fn direction(a: &Point2, b: &Point2, min_len: f64) -> Option<Vector2> {
    let d = b - a;
    let len = d.norm();
    if len <= min_len.max(EPSILON) {
        None
    } else {
        Some(d / len)
    }
}

/// Signed turning angle (radians, in `(-π, π]`) from `d_in` to `d_out`.
/// Positive for a left (counter-clockwise) turn.
#[must_use]
pub fn turn_angle(d_in: &Vector2, d_out: &Vector2) -> f64 {
    cross(d_in, d_out).atan2(d_in.dot(d_out))
}

/// Number of chords needed to approximate an arc within `tolerance`.
///
/// From the sagitta formula: `sagitta = r * (1 - cos(θ/2))`, so each chord may
/// span at most `θ = 2 * acos(1 - tolerance / r)`.
#[must_use]
pub fn arc_subdivision_count(radius: f64, abs_sweep: f64, tolerance: f64) -> usize {
    if radius < EPSILON || abs_sweep < EPSILON || tolerance <= 0.0 {
        return 1;
    }
    let max_angle = if tolerance >= radius {
        std::f64::consts::PI
    } else {
        2.0 * (1.0 - tolerance / radius).acos()
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = (abs_sweep / max_angle).ceil().min(4096.0) as usize;
    n.max(1)
}
