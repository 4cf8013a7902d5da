use crate::math::distance_2d::point_to_segment_dist;
use crate::math::polygon_2d::point_in_rings_strict;
use crate::math::Point2;

use super::split::{Edge, EdgeFragment};

/// Where an edge fragment lies relative to the other operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentClass {
    Inside,
    Outside,
    /// On the other boundary, running the same way: both interiors on one side.
    Shared,
    /// On the other boundary, running the opposite way: interiors on opposite sides.
    SharedOpposite,
}

/// Other operand's boundary, with its rings kept for the even-odd test.
pub struct Operand<'a> {
    pub edges: &'a [Edge],
    pub rings: Vec<Vec<Point2>>,
}

impl Operand<'_> {
    /// Classifies `fragment` by its midpoint. A midpoint within `tolerance`
    /// of an edge is on the boundary; the nearest edge's direction then
    /// decides between shared and opposite.
    pub fn classify(&self, fragment: &EdgeFragment, tolerance: f64) -> FragmentClass {
        let mid = fragment.midpoint();
        let nearest = self
            .edges
            .iter()
            .map(|e| (point_to_segment_dist(&mid, &e.start, &e.end), e))
            .min_by(|x, y| x.0.total_cmp(&y.0));

        if let Some((d, edge)) = nearest {
            if d <= tolerance {
                let along = (fragment.end - fragment.start).dot(&(edge.end - edge.start));
                return if along >= 0.0 {
                    FragmentClass::Shared
                } else {
                    FragmentClass::SharedOpposite
                };
            }
        }

        let refs: Vec<&[Point2]> = self.rings.iter().map(Vec::as_slice).collect();
        if point_in_rings_strict(&mid, &refs) {
            FragmentClass::Inside
        } else {
            FragmentClass::Outside
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::boolean::split::ShapeSource;

    fn square_edges(size: f64) -> Vec<Edge> {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ];
        (0..4)
            .map(|i| Edge {
                start: pts[i],
                end: pts[(i + 1) % 4],
            })
            .collect()
    }

    fn fragment(a: (f64, f64), b: (f64, f64)) -> EdgeFragment {
        EdgeFragment {
            start: Point2::new(a.0, a.1),
            end: Point2::new(b.0, b.1),
            source: ShapeSource::B,
        }
    }

    #[test]
    fn classifies_each_case() {
        let edges = square_edges(2.0);
        let operand = Operand {
            edges: &edges,
            rings: vec![edges.iter().map(|e| e.start).collect()],
        };
        assert_eq!(operand.classify(&fragment((0.5, 0.5), (1.5, 1.5)), 1e-6), FragmentClass::Inside);
        assert_eq!(operand.classify(&fragment((3.0, 0.0), (4.0, 1.0)), 1e-6), FragmentClass::Outside);
        assert_eq!(operand.classify(&fragment((0.5, 0.0), (1.5, 0.0)), 1e-6), FragmentClass::Shared);
        assert_eq!(
            operand.classify(&fragment((1.5, 0.0), (0.5, 0.0)), 1e-6),
            FragmentClass::SharedOpposite
        );
    }
}
