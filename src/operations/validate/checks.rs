use crate::geometry::{Curve, Polygon, WallSolid};
use crate::math::distance_2d::closest_on_polyline;
use crate::math::polygon_2d::{point_in_rings_strict, ring_centroid};
use crate::math::Point2;
use crate::tessellation::triangulate_polygon;

/// Defect tallies over all faces of a solid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct DefectCounts {
    pub self_intersections: usize,
    pub degenerate: usize,
    pub slivers: usize,
    pub micro_gaps: usize,
}

fn ring_segments(ring: &[Point2]) -> impl Iterator<Item = f64> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[(i + 1) % n] - ring[i]).norm())
}

pub(super) fn count_defects(
    faces: &[Polygon],
    tolerance: f64,
    sliver_threshold: f64,
    micro_gap_threshold: f64,
) -> DefectCounts {
    let mut counts = DefectCounts::default();
    for face in faces {
        counts.self_intersections += face.count_self_intersections(tolerance);
        if face.area() <= tolerance * tolerance {
            counts.degenerate += 1;
        } else if face.is_sliver(sliver_threshold) {
            counts.slivers += 1;
        }
        for ring in face.rings() {
            for len in ring_segments(&ring) {
                if len < tolerance {
                    counts.degenerate += 1;
                } else if len < micro_gap_threshold {
                    counts.micro_gaps += 1;
                }
            }
        }
    }

    // Near-coincident vertices of different faces.
    for (i, a) in faces.iter().enumerate() {
        for b in &faces[i + 1..] {
            if !a.bounding_box().overlaps(&b.bounding_box(), micro_gap_threshold) {
                continue;
            }
            for p in a.outer_ring() {
                counts.micro_gaps += b
                    .outer_ring()
                    .iter()
                    .filter(|q| {
                        let d = p.distance_to(q);
                        d > 0.0 && d < micro_gap_threshold
                    })
                    .count();
            }
        }
    }
    counts
}

/// Location half way along a polyline, closing segment included for closed curves.
pub(super) fn midpoint_along(curve: &Curve) -> Option<Point2> {
    let mut coords = curve.coords();
    if curve.is_closed() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    let total: f64 = coords.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    let mut remaining = total * 0.5;
    for w in coords.windows(2) {
        let len = (w[1] - w[0]).norm();
        if len > 0.0 && remaining <= len {
            return Some(w[0] + (w[1] - w[0]) * (remaining / len));
        }
        remaining -= len;
    }
    coords.first().copied()
}

/// Distance from `p` to a curve, closing segment included for closed curves.
pub(super) fn distance_to_curve(p: &Point2, curve: &Curve) -> Option<f64> {
    let mut coords = curve.coords();
    if curve.is_closed() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    closest_on_polyline(p, &coords).map(|(d, ..)| d)
}

/// Structural problems between baseline, offsets, and faces.
pub(super) fn topology_problems(solid: &WallSolid, tolerance: f64) -> (usize, Vec<String>) {
    const CHECKS: usize = 4;
    let mut problems = Vec::new();
    let faces = solid.solid_geometry();

    if faces.is_empty() {
        problems.push("wall has no solid geometry".to_string());
    }

    let mid = midpoint_along(solid.baseline());
    match (solid.left_offset(), solid.right_offset(), mid) {
        (Some(left), Some(right), Some(mid)) => {
            let half = solid.thickness() * 0.5;
            let band = tolerance + solid.thickness() * 0.01;
            for (side, curve) in [("left", left), ("right", right)] {
                if let Some(d) = distance_to_curve(&mid, curve) {
                    if (d - half).abs() > band {
                        problems.push(format!("{side} offset is {d:.3} from the baseline, expected {half:.3}"));
                    }
                }
            }
        }
        (None, None, _) => problems.push("wall has no offset curves".to_string()),
        (Some(_), None, _) | (None, Some(_), _) => problems.push("wall has only one offset curve".to_string()),
        (_, _, None) => problems.push("baseline has no length".to_string()),
    }

    if let Some(mid) = mid {
        if !faces.is_empty() && !faces.iter().any(|f| f.contains(&mid, tolerance)) {
            problems.push("baseline midpoint lies outside the solid".to_string());
        }
    }

    for (i, face) in faces.iter().enumerate() {
        let outer = face.outer_coords();
        let outer_refs: [&[Point2]; 1] = [&outer];
        for hole in face.hole_coords() {
            let probe = ring_centroid(&hole);
            if !point_in_rings_strict(&probe, &outer_refs) {
                problems.push(format!("face {i} has a hole outside its boundary"));
            }
        }
    }
    (CHECKS, problems)
}

/// Share of the faces' area covered by triangles thinner than `min_width`.
/// Faces that cannot be triangulated are skipped and reported by count.
pub(super) fn thin_area_fraction(faces: &[Polygon], min_width: f64) -> (f64, usize) {
    let mut total = 0.0;
    let mut thin = 0.0;
    let mut failed = 0;
    for face in faces {
        match triangulate_polygon(face) {
            Ok(triangles) => {
                for t in &triangles {
                    let a = t.area();
                    total += a;
                    if t.min_altitude() < min_width {
                        thin += a;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "face skipped by triangulation");
                failed += 1;
            }
        }
    }
    let fraction = if total > 0.0 { thin / total } else { 0.0 };
    (fraction, failed)
}
