use std::collections::{HashMap, HashSet, VecDeque};

use spade::handles::{FixedFaceHandle, InnerTag};
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation};

use crate::error::{GeometricError, Result};
use crate::geometry::Polygon;
use crate::math::{cross, Point2};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// A triangle of a polygon triangulation, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle(pub [Point2; 3]);

impl Triangle {
    #[must_use]
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.0;
        cross(&(b - a), &(c - a)).abs() * 0.5
    }

    /// Smallest altitude: twice the area over the longest edge.
    #[must_use]
    pub fn min_altitude(&self) -> f64 {
        let [a, b, c] = self.0;
        let longest = (b - a).norm().max((c - b).norm()).max((a - c).norm());
        if longest <= 0.0 {
            0.0
        } else {
            2.0 * self.area() / longest
        }
    }
}

/// Constrained Delaunay triangulation of a polygon with holes.
///
/// # Errors
///
/// `numerical_instability` when a vertex cannot be inserted, and
/// `self_intersection` when boundary edges cross each other.
pub fn triangulate_polygon(polygon: &Polygon) -> Result<Vec<Triangle>> {
    let mut cdt = Cdt::new();
    insert_constraint_loop(&mut cdt, &polygon.outer_coords())?;
    for hole in polygon.hole_coords() {
        insert_constraint_loop(&mut cdt, &hole)?;
    }

    let interior = classify_interior_faces(&cdt);
    let triangles = cdt
        .inner_faces()
        .filter(|f| interior.contains(&f.fix().index()))
        .map(|f| {
            let [a, b, c] = f.vertices().map(|v| {
                let p = v.position();
                Point2::new(p.x, p.y)
            });
            Triangle([a, b, c])
        })
        .collect();
    Ok(triangles)
}

fn insert_constraint_loop(cdt: &mut Cdt, ring: &[Point2]) -> Result<()> {
    if ring.len() < 3 {
        return Err(GeometricError::degenerate("constraint loop needs at least 3 points"));
    }

    let mut handles = Vec::with_capacity(ring.len());
    for p in ring {
        let h = cdt
            .insert(SpadePoint2::new(p.x, p.y))
            .map_err(|e: InsertionError| GeometricError::numerical(format!("CDT insert: {e}")))?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from == to {
            continue;
        }
        if !cdt.can_add_constraint(from, to) {
            return Err(GeometricError::self_intersection("boundary edges cross"));
        }
        cdt.add_constraint(from, to);
    }
    Ok(())
}

/// Flood-fills faces from the outside, counting constraint crossings. Odd
/// depth is interior.
fn classify_interior_faces(cdt: &Cdt) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<InnerTag>, u32)> = VecDeque::new();

    let outer_fix = cdt.outer_face().fix();
    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer_fix {
            continue;
        }
        if let Some(inner) = edge.rev().face().as_inner() {
            let idx = inner.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(idx, depth);
            if depth % 2 == 1 {
                interior.insert(idx);
            }
            queue.push_back((inner.fix(), depth));
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        for edge in cdt.face(face_fix).adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let idx = neighbor.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let next = depth + u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(idx, next);
            if next % 2 == 1 {
                interior.insert(idx);
            }
            queue.push_back((neighbor.fix(), next));
        }
    }
    interior
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::CreationMethod;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn rectangle_gives_two_triangles() {
        let p = Polygon::from_coords(
            &ring(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]),
            &[],
            CreationMethod::UserInput,
            0.01,
        )
        .unwrap();
        let tris = triangulate_polygon(&p).unwrap();
        assert_eq!(tris.len(), 2);
        assert_relative_eq!(tris.iter().map(Triangle::area).sum::<f64>(), 200_000.0, epsilon = 1e-6);
    }

    #[test]
    fn holes_are_left_empty() {
        let p = Polygon::from_coords(
            &ring(&[(0.0, 0.0), (4000.0, 0.0), (4000.0, 3000.0), (0.0, 3000.0)]),
            &[ring(&[(200.0, 200.0), (3800.0, 200.0), (3800.0, 2800.0), (200.0, 2800.0)])],
            CreationMethod::UserInput,
            0.01,
        )
        .unwrap();
        let tris = triangulate_polygon(&p).unwrap();
        assert_eq!(tris.len(), 8);
        assert_relative_eq!(
            tris.iter().map(Triangle::area).sum::<f64>(),
            4000.0 * 3000.0 - 3600.0 * 2600.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn altitude_of_a_flat_triangle() {
        let t = Triangle([Point2::new(0.0, 0.0), Point2::new(1000.0, 0.0), Point2::new(500.0, 0.05)]);
        assert_relative_eq!(t.min_altitude(), 0.05, epsilon = 1e-9);
    }
}
