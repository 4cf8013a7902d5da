use std::f64::consts::PI;

use crate::error::{GeometricError, Result};
use crate::geometry::{
    CreationMethod, IntersectionData, JoinType, JunctionType, Polygon, ResolutionMethod, WallSolid,
};
use crate::math::distance_2d::closest_on_polyline;
use crate::math::intersect_2d::{line_line_point, segment_segment_intersect_2d};
use crate::math::{cross, direction, left_normal, Point2, Vector2};
use crate::operations::tolerance::ToleranceContext;

use super::arms::{baseline_path, junction_point, Arm, EndpointAdjustment, WallEnd};
use super::classify::{find_overlap, line_angle};
use super::IntersectionResolver;

/// Miter apex distance, in larger half thicknesses, beyond which an L
/// corner is bevelled.
const MITER_LIMIT: f64 = 4.0;

/// One resolved junction: what to record and which offset ends to move.
#[derive(Debug, Clone)]
pub(super) struct Resolution {
    pub data: IntersectionData,
    /// Indices of the participating walls.
    pub walls: Vec<usize>,
    pub adjustments: Vec<EndpointAdjustment>,
    pub warnings: Vec<String>,
}

/// A wall passing through a junction rather than ending at it.
#[derive(Debug, Clone, Copy)]
struct Through {
    foot: Point2,
    dir: Vector2,
    half_thickness: f64,
}

impl Through {
    /// Face line on the side `toward` points to.
    fn face_toward(&self, toward: &Vector2) -> (Point2, Vector2) {
        let side = if cross(&self.dir, toward) >= 0.0 { 1.0 } else { -1.0 };
        (self.foot + left_normal(&self.dir) * (side * self.half_thickness), self.dir)
    }

    fn faces(&self) -> [(Point2, Vector2); 2] {
        let n = left_normal(&self.dir) * self.half_thickness;
        [(self.foot + n, self.dir), (self.foot - n, self.dir)]
    }
}

fn meet(a: (Point2, Vector2), b: (Point2, Vector2)) -> Result<Point2> {
    line_line_point(&a.0, &a.1, &b.0, &b.1)
        .ok_or_else(|| GeometricError::numerical("junction faces are parallel"))
}

/// LEFT offset line of `arm` against the RIGHT offset line of `next`.
fn corner_between(arm: &Arm, next: &Arm) -> Result<Point2> {
    meet(arm.left_line(), next.right_line())
}

fn patch(points: &[Point2], tolerance: f64) -> Option<Polygon> {
    Polygon::from_coords(points, &[], CreationMethod::Intersection, tolerance)
        .ok()
        .filter(|p| p.area() > tolerance * tolerance)
}

fn accuracy(gap: f64, tolerance: f64) -> f64 {
    1.0 - 0.01 * (gap / tolerance.max(f64::EPSILON)).min(1.0)
}

/// End of `solid` lying at `foot`, if any.
fn end_at(solid: &WallSolid, path: &[Point2], foot: &Point2, tolerance: f64) -> Option<WallEnd> {
    if solid.baseline().is_closed() {
        return None;
    }
    WallEnd::BOTH
        .into_iter()
        .find(|e| (e.point(path) - *foot).norm() <= tolerance)
}

fn thickness_warning(walls: &[&WallSolid], tolerance: f64, warnings: &mut Vec<String>) {
    let (min, max) = walls.iter().fold((f64::INFINITY, 0.0_f64), |(lo, hi), w| {
        (lo.min(w.thickness()), hi.max(w.thickness()))
    });
    if max - min > tolerance {
        warnings.push(format!("thickness mismatch at junction: {min} vs {max}"));
    }
}

/// Point where every path passes within `tolerance`, chosen among path
/// endpoints and pairwise crossings.
fn common_point(paths: &[Vec<Point2>], tolerance: f64) -> Result<Point2> {
    let mut candidates: Vec<Point2> = paths
        .iter()
        .flat_map(|p| [p[0], p[p.len() - 1]])
        .collect();
    for (i, a) in paths.iter().enumerate() {
        for b in &paths[i + 1..] {
            for wa in a.windows(2) {
                for wb in b.windows(2) {
                    if let Some((hit, ..)) = segment_segment_intersect_2d(&wa[0], &wa[1], &wb[0], &wb[1], tolerance) {
                        candidates.push(hit);
                    }
                }
            }
        }
    }

    let score = |c: &Point2| {
        paths.iter().fold((0_usize, 0.0), |(n, sum), path| {
            match closest_on_polyline(c, path) {
                Some((d, ..)) if d <= tolerance => (n + 1, sum + d),
                _ => (n, sum),
            }
        })
    };
    candidates
        .iter()
        .map(|c| (*c, score(c)))
        .filter(|(_, (n, _))| *n == paths.len())
        .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map(|(c, _)| c)
        .ok_or_else(|| GeometricError::topology("walls do not meet at a common point"))
}

impl IntersectionResolver {
    /// Widens `tolerance` through the tolerance manager when the junction
    /// angle (degrees) is below the extreme-angle threshold.
    fn junction_tolerance(&self, angle: f64, thickness: f64, tolerance: f64, warnings: &mut Vec<String>) -> f64 {
        if angle >= self.config.extreme_angle_threshold {
            return tolerance;
        }
        let widened = self
            .tolerances
            .calculate_tolerance(thickness, tolerance, angle, ToleranceContext::BooleanOperation)
            .map_or(tolerance, |t| t.max(tolerance));
        tracing::debug!(angle, tolerance, widened, "extreme junction angle");
        warnings.push(format!(
            "extreme_angle: {angle:.1}° junction, tolerance widened to {widened:.4}"
        ));
        widened
    }

    /// Trims the branch flat against the near face of the main wall. When
    /// the junction sits on an end of the main wall, that end is carried
    /// through to the branch's outer face.
    pub(super) fn solve_t(&self, walls: &[WallSolid], main: usize, branch: usize, tolerance: f64) -> Result<Resolution> {
        let (main_wall, branch_wall) = (&walls[main], &walls[branch]);
        if branch_wall.baseline().is_closed() {
            return Err(GeometricError::topology("a closed wall cannot end on another wall"));
        }
        let main_path = baseline_path(main_wall, tolerance)?;
        let branch_path = baseline_path(branch_wall, tolerance)?;

        let (end, gap, seg, foot) = WallEnd::BOTH
            .into_iter()
            .filter_map(|e| closest_on_polyline(&e.point(&branch_path), &main_path).map(|(d, s, _, q)| (e, d, s, q)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| GeometricError::degenerate("main wall has no segments"))?;

        let arm = Arm::from_wall(branch, branch_wall, end, tolerance)?;
        let main_dir = direction(&main_path[seg], &main_path[seg + 1], 0.0)
            .ok_or_else(|| GeometricError::degenerate("main wall segment has zero length"))?;
        let angle = line_angle(&main_dir, &arm.dir);
        let main_end = end_at(main_wall, &main_path, &foot, tolerance);

        if angle < self.config.parallel_overlap_threshold {
            return if main_end.is_some() && gap <= tolerance {
                self.solve_l(walls, main, branch, tolerance)
            } else {
                self.solve_overlap(walls, main, branch, tolerance)
            };
        }

        let mut warnings = Vec::new();
        let thickness = main_wall.thickness().max(branch_wall.thickness());
        let tol = self.junction_tolerance(angle, thickness, tolerance, &mut warnings);
        if gap > tol {
            return Err(GeometricError::topology(format!(
                "branch end is {gap:.4} from the main wall (tolerance {tol})"
            )));
        }
        thickness_warning(&[main_wall, branch_wall], tol, &mut warnings);

        let face = Through {
            foot,
            dir: main_dir,
            half_thickness: main_wall.thickness() * 0.5,
        };
        let near = face.face_toward(&arm.dir);
        let far = face.face_toward(&-arm.dir);
        let near_left = meet(arm.left_line(), near)?;
        let near_right = meet(arm.right_line(), near)?;
        let far_left = meet(arm.left_line(), far)?;
        let far_right = meet(arm.right_line(), far)?;

        let mut adjustments = vec![arm.adjust(near_left, near_right)];
        if let Some(main_end) = main_end {
            let main_arm = Arm::from_wall(main, main_wall, main_end, tol)?;
            let outside = if left_normal(&arm.dir).dot(&main_arm.dir) < 0.0 {
                arm.left_line()
            } else {
                arm.right_line()
            };
            adjustments.push(main_arm.adjust(meet(main_arm.left_line(), outside)?, meet(main_arm.right_line(), outside)?));
        }

        let mut data = IntersectionData::new(
            JunctionType::T,
            vec![main_wall.id(), branch_wall.id()],
            junction_point(foot, tol),
            ResolutionMethod::Butt,
        );
        data.offset_intersections = vec![junction_point(near_left, tol), junction_point(near_right, tol)];
        data.resolved_geometry = patch(&[near_left, near_right, far_right, far_left], tol);
        data.geometric_accuracy = accuracy(gap, tol);
        data.validated = true;

        tracing::debug!(angle, gap, at_main_end = main_end.is_some(), "resolved T junction");
        Ok(Resolution {
            data,
            walls: vec![main, branch],
            adjustments,
            warnings,
        })
    }

    /// Joins two wall ends at a shared point with a miter, or a bevel when
    /// either end asks for one or the apex runs past the miter limit.
    pub(super) fn solve_l(&self, walls: &[WallSolid], a: usize, b: usize, tolerance: f64) -> Result<Resolution> {
        let (wall_a, wall_b) = (&walls[a], &walls[b]);
        if wall_a.baseline().is_closed() || wall_b.baseline().is_closed() {
            return Err(GeometricError::topology("closed walls have no free ends"));
        }
        let pa = baseline_path(wall_a, tolerance)?;
        let pb = baseline_path(wall_b, tolerance)?;

        let (ea, eb, gap) = WallEnd::BOTH
            .into_iter()
            .flat_map(|ea| WallEnd::BOTH.into_iter().map(move |eb| (ea, eb)))
            .map(|(ea, eb)| (ea, eb, (ea.point(&pa) - eb.point(&pb)).norm()))
            .min_by(|x, y| x.2.total_cmp(&y.2))
            .ok_or_else(|| GeometricError::degenerate("walls have no ends"))?;

        let arm_a = Arm::from_wall(a, wall_a, ea, tolerance)?;
        let arm_b = Arm::from_wall(b, wall_b, eb, tolerance)?;
        let corner = nalgebra::center(&arm_a.origin, &arm_b.origin);
        let (arm_a, arm_b) = (arm_a.anchored_at(corner), arm_b.anchored_at(corner));

        let phi = arm_a.dir.dot(&arm_b.dir).clamp(-1.0, 1.0).acos().to_degrees();
        let parallel = self.config.parallel_overlap_threshold;
        if phi < parallel {
            return self.solve_overlap(walls, a, b, tolerance);
        }

        let mut warnings = Vec::new();
        let thickness = wall_a.thickness().max(wall_b.thickness());
        let tol = self.junction_tolerance(phi, thickness, tolerance, &mut warnings);
        if gap > tol {
            return Err(GeometricError::topology(format!(
                "wall ends are {gap:.4} apart (tolerance {tol})"
            )));
        }
        thickness_warning(&[wall_a, wall_b], tol, &mut warnings);
        let ids = vec![wall_a.id(), wall_b.id()];

        if phi > 180.0 - parallel {
            // Straight continuation: square both ends off at the shared point.
            let adjustments = [arm_a, arm_b]
                .iter()
                .map(|arm| arm.adjust(arm.left_line().0, arm.right_line().0))
                .collect();
            let mut data = IntersectionData::new(JunctionType::L, ids, junction_point(corner, tol), ResolutionMethod::Butt);
            data.geometric_accuracy = accuracy(gap, tol);
            data.validated = true;
            return Ok(Resolution {
                data,
                walls: vec![a, b],
                adjustments,
                warnings,
            });
        }

        let (first, second) = if arm_a.angle() <= arm_b.angle() { (arm_a, arm_b) } else { (arm_b, arm_a) };
        let c0 = corner_between(&first, &second)?;
        let c1 = corner_between(&second, &first)?;
        // c0 lies in the wedge swept counter-clockwise from `first` to `second`.
        let c0_inner = second.angle() - first.angle() < PI;
        let (inner, apex) = if c0_inner { (c0, c1) } else { (c1, c0) };
        let outer_first = if c0_inner { first.right_line().0 } else { first.left_line().0 };
        let outer_second = if c0_inner { second.left_line().0 } else { second.right_line().0 };

        let requested_bevel = [(wall_a, ea), (wall_b, eb)]
            .iter()
            .any(|(w, e)| matches!(w.join_at(e.role()), Some(JoinType::Bevel | JoinType::Round)));
        let apex_distance = (apex - corner).norm();
        let too_long = apex_distance > MITER_LIMIT * 0.5 * thickness;
        if too_long && !requested_bevel {
            warnings.push(format!(
                "miter_limit: apex {apex_distance:.1} from the corner, bevelled"
            ));
        }

        let (mut data, adjustments) = if requested_bevel || too_long {
            let adjustments = if c0_inner {
                vec![first.adjust(c0, outer_first), second.adjust(outer_second, c0)]
            } else {
                vec![first.adjust(outer_first, c1), second.adjust(c1, outer_second)]
            };
            let mut data = IntersectionData::new(JunctionType::L, ids, junction_point(corner, tol), ResolutionMethod::Bevel);
            data.offset_intersections = vec![junction_point(inner, tol)];
            data.resolved_geometry = patch(&[inner, outer_first, outer_second], tol);
            (data, adjustments)
        } else {
            let adjustments = vec![first.adjust(c0, c1), second.adjust(c1, c0)];
            let mut data = IntersectionData::new(JunctionType::L, ids, junction_point(corner, tol), ResolutionMethod::Miter);
            data.miter_apex = Some(junction_point(apex, tol));
            data.offset_intersections = vec![junction_point(inner, tol), junction_point(apex, tol)];
            data.resolved_geometry = patch(&[inner, outer_first, apex, outer_second], tol);
            (data, adjustments)
        };
        data.geometric_accuracy = accuracy(gap, tol);
        data.validated = true;

        tracing::debug!(angle = phi, method = ?data.resolution_method, "resolved L junction");
        Ok(Resolution {
            data,
            walls: vec![a, b],
            adjustments,
            warnings,
        })
    }

    /// Resolves three or more walls (or two crossing walls) meeting at one
    /// point, face by face.
    ///
    /// Walls ending at the point are trimmed against the faces of walls
    /// passing through it. When every wall ends there, adjacent arms are
    /// mitred pairwise around the point and the hub between them becomes the
    /// resolved geometry.
    pub(super) fn solve_cross(
        &self,
        walls: &[WallSolid],
        members: &[usize],
        point: Option<Point2>,
        tolerance: f64,
    ) -> Result<Resolution> {
        let paths = members
            .iter()
            .map(|&w| baseline_path(&walls[w], tolerance))
            .collect::<Result<Vec<_>>>()?;
        let center = match point {
            Some(p) => p,
            None => common_point(&paths, tolerance)?,
        };

        let mut feet = Vec::with_capacity(members.len());
        for (&w, path) in members.iter().zip(&paths) {
            let (d, seg, _, foot) = closest_on_polyline(&center, path)
                .ok_or_else(|| GeometricError::degenerate("wall has no segments"))?;
            let dir = direction(&path[seg], &path[seg + 1], 0.0)
                .ok_or_else(|| GeometricError::degenerate("wall segment has zero length"))?;
            feet.push((w, d, foot, dir));
        }

        let mut warnings = Vec::new();
        let sharpest = feet
            .iter()
            .enumerate()
            .flat_map(|(i, a)| feet[i + 1..].iter().map(move |b| line_angle(&a.3, &b.3)))
            .fold(90.0_f64, f64::min);
        let thickness = members.iter().map(|&w| walls[w].thickness()).fold(0.0, f64::max);
        let tol = self.junction_tolerance(sharpest, thickness, tolerance, &mut warnings);
        let members_ref: Vec<&WallSolid> = members.iter().map(|&w| &walls[w]).collect();
        thickness_warning(&members_ref, tol, &mut warnings);

        let mut arms = Vec::new();
        let mut through = Vec::new();
        let mut gap_max = 0.0_f64;
        for (&(w, d, foot, dir), path) in feet.iter().zip(&paths) {
            if d > tol {
                return Err(GeometricError::topology(format!(
                    "wall {} misses the junction by {d:.4}",
                    walls[w].id()
                )));
            }
            gap_max = gap_max.max(d);
            match end_at(&walls[w], path, &foot, tol) {
                Some(end) => arms.push(Arm::from_wall(w, &walls[w], end, tol)?.anchored_at(center)),
                None => through.push(Through {
                    foot,
                    dir,
                    half_thickness: walls[w].thickness() * 0.5,
                }),
            }
        }

        let mut adjustments = Vec::with_capacity(arms.len());
        let mut corners = Vec::new();
        let hub = if through.is_empty() {
            arms.sort_by(|x, y| x.angle().total_cmp(&y.angle()));
            let n = arms.len();
            let mut lefts: Vec<Point2> = arms.iter().map(|a| a.left_line().0).collect();
            let mut rights: Vec<Point2> = arms.iter().map(|a| a.right_line().0).collect();
            let mut hub = Vec::with_capacity(2 * n);
            for k in 0..n {
                let next = (k + 1) % n;
                let mut sweep = arms[next].angle() - arms[k].angle();
                if next == 0 {
                    sweep += 2.0 * PI;
                }
                match corner_between(&arms[k], &arms[next]) {
                    Ok(c) if sweep < PI => {
                        lefts[k] = c;
                        rights[next] = c;
                        corners.push(c);
                        hub.push(c);
                    }
                    // Reflex gap: leave both ends square.
                    _ => {
                        hub.push(lefts[k]);
                        hub.push(rights[next]);
                    }
                }
            }
            adjustments.extend(arms.iter().enumerate().map(|(k, arm)| arm.adjust(lefts[k], rights[k])));
            patch(&hub, tol)
        } else {
            for arm in &arms {
                let best = through
                    .iter()
                    .filter_map(|t| {
                        let face = t.face_toward(&arm.dir);
                        let l = meet(arm.left_line(), face).ok()?;
                        let r = meet(arm.right_line(), face).ok()?;
                        let reach = (l - arm.origin).dot(&arm.dir).max((r - arm.origin).dot(&arm.dir));
                        Some((reach, l, r))
                    })
                    .max_by(|x, y| x.0.total_cmp(&y.0));
                if let Some((_, l, r)) = best {
                    adjustments.push(arm.adjust(l, r));
                    corners.extend([l, r]);
                }
            }
            match through.as_slice() {
                [t1, t2, ..] => {
                    let [a0, a1] = t1.faces();
                    let [b0, b1] = t2.faces();
                    match (meet(a0, b0), meet(a0, b1), meet(a1, b1), meet(a1, b0)) {
                        (Ok(p0), Ok(p1), Ok(p2), Ok(p3)) => patch(&[p0, p1, p2, p3], tol),
                        _ => None,
                    }
                }
                _ => None,
            }
        };

        warnings.push(format!(
            "complexity: {}-wall cross junction resolved face by face",
            members.len()
        ));
        let mut data = IntersectionData::new(
            JunctionType::Cross,
            members.iter().map(|&w| walls[w].id()).collect(),
            junction_point(center, tol),
            ResolutionMethod::FaceByFace,
        );
        data.offset_intersections = corners.into_iter().map(|c| junction_point(c, tol)).collect();
        data.resolved_geometry = hub;
        data.geometric_accuracy = accuracy(gap_max, tol);
        data.validated = true;

        tracing::debug!(walls = members.len(), ends = arms.len(), through = through.len(), "resolved cross junction");
        Ok(Resolution {
            data,
            walls: members.to_vec(),
            adjustments,
            warnings,
        })
    }

    /// Merges two parallel, overlapping walls into one band over their
    /// shared extent. Offsets are left as they are.
    pub(super) fn solve_overlap(&self, walls: &[WallSolid], a: usize, b: usize, tolerance: f64) -> Result<Resolution> {
        let (wall_a, wall_b) = (&walls[a], &walls[b]);
        let (half_a, half_b) = (wall_a.thickness() * 0.5, wall_b.thickness() * 0.5);
        let overlap = find_overlap(
            &baseline_path(wall_a, tolerance)?,
            half_a,
            &baseline_path(wall_b, tolerance)?,
            half_b,
            self.config.parallel_overlap_threshold,
            tolerance,
        )
        .ok_or_else(|| GeometricError::topology("walls run parallel but do not overlap"))?;

        let mut warnings = Vec::new();
        thickness_warning(&[wall_a, wall_b], tolerance, &mut warnings);
        warnings.push(format!(
            "parallel_overlap: walls overlap over {:.1}, merged",
            overlap.length()
        ));

        let low = (-half_a).min(overlap.lateral - half_b);
        let high = half_a.max(overlap.lateral + half_b);
        let mid = 0.5 * overlap.lateral;
        let band = [
            overlap.at(overlap.lo, low),
            overlap.at(overlap.hi, low),
            overlap.at(overlap.hi, high),
            overlap.at(overlap.lo, high),
        ];

        let mut data = IntersectionData::new(
            JunctionType::ParallelOverlap,
            vec![wall_a.id(), wall_b.id()],
            junction_point(overlap.at(0.5 * (overlap.lo + overlap.hi), mid), tolerance),
            ResolutionMethod::OverlapMerge,
        );
        data.offset_intersections = vec![
            junction_point(overlap.at(overlap.lo, mid), tolerance),
            junction_point(overlap.at(overlap.hi, mid), tolerance),
        ];
        data.resolved_geometry = patch(&band, tolerance);
        data.validated = true;

        tracing::debug!(length = overlap.length(), lateral = overlap.lateral, "merged parallel overlap");
        Ok(Resolution {
            data,
            walls: vec![a, b],
            adjustments: Vec::new(),
            warnings,
        })
    }
}
