use crate::geometry::Polygon;
use crate::math::intersect_2d::segment_contacts;
use crate::math::Point2;

/// Which operand a fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeSource {
    A,
    B,
}

/// A directed boundary edge of one operand.
///
/// Outer rings run counter-clockwise and holes clockwise, so the operand's
/// interior is always on the left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub start: Point2,
    pub end: Point2,
}

/// A piece of an operand edge between two consecutive split points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeFragment {
    pub start: Point2,
    pub end: Point2,
    pub source: ShapeSource,
}

impl EdgeFragment {
    pub fn midpoint(&self) -> Point2 {
        nalgebra::center(&self.start, &self.end)
    }

    pub fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            ..*self
        }
    }
}

/// Boundary edges of every ring of every polygon in `shape`.
pub fn shape_edges(shape: &[Polygon]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for polygon in shape {
        for ring in polygon.rings() {
            let n = ring.len();
            edges.extend((0..n).map(|i| Edge {
                start: ring[i],
                end: ring[(i + 1) % n],
            }));
        }
    }
    edges
}

/// Splits the edges of both operands at every contact between them.
///
/// A contact point is computed once per edge pair and inserted into both
/// edges, so fragments of A and B meet at identical coordinates.
pub fn split_edges(a: &[Edge], b: &[Edge], tolerance: f64) -> (Vec<EdgeFragment>, Vec<EdgeFragment>) {
    let mut cuts_a: Vec<Vec<(f64, Point2)>> = vec![Vec::new(); a.len()];
    let mut cuts_b: Vec<Vec<(f64, Point2)>> = vec![Vec::new(); b.len()];

    for (i, ea) in a.iter().enumerate() {
        for (j, eb) in b.iter().enumerate() {
            for contact in segment_contacts(&ea.start, &ea.end, &eb.start, &eb.end, tolerance) {
                cuts_a[i].push((contact.t, contact.point));
                cuts_b[j].push((contact.u, contact.point));
            }
        }
    }

    (
        fragment_edges(a, cuts_a, ShapeSource::A, tolerance),
        fragment_edges(b, cuts_b, ShapeSource::B, tolerance),
    )
}

fn fragment_edges(
    edges: &[Edge],
    cuts: Vec<Vec<(f64, Point2)>>,
    source: ShapeSource,
    tolerance: f64,
) -> Vec<EdgeFragment> {
    let mut fragments = Vec::with_capacity(edges.len());
    for (edge, mut cuts) in edges.iter().zip(cuts) {
        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));
        let mut start = edge.start;
        for (_, point) in cuts {
            if (point - start).norm() > tolerance && (edge.end - point).norm() > tolerance {
                fragments.push(EdgeFragment {
                    start,
                    end: point,
                    source,
                });
                start = point;
            }
        }
        if (edge.end - start).norm() > tolerance {
            fragments.push(EdgeFragment {
                start,
                end: edge.end,
                source,
            });
        }
    }
    fragments
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::CreationMethod;

    fn square(x: f64, y: f64, size: f64) -> Polygon {
        Polygon::from_coords(
            &[
                Point2::new(x, y),
                Point2::new(x + size, y),
                Point2::new(x + size, y + size),
                Point2::new(x, y + size),
            ],
            &[],
            CreationMethod::UserInput,
            0.01,
        )
        .unwrap()
    }

    #[test]
    fn crossing_squares_split_twice() {
        let a = shape_edges(&[square(0.0, 0.0, 2.0)]);
        let b = shape_edges(&[square(1.0, 1.0, 2.0)]);
        let (fa, fb) = split_edges(&a, &b, 1e-9);
        // Two crossings, each splitting one edge of each square.
        assert_eq!(fa.len(), 6);
        assert_eq!(fb.len(), 6);
        assert!(fa.iter().any(|f| f.end == Point2::new(2.0, 1.0)));
        assert!(fb.iter().any(|f| f.start == Point2::new(2.0, 1.0)));
    }

    #[test]
    fn disjoint_edges_stay_whole() {
        let a = shape_edges(&[square(0.0, 0.0, 1.0)]);
        let b = shape_edges(&[square(5.0, 5.0, 1.0)]);
        let (fa, fb) = split_edges(&a, &b, 1e-9);
        assert_eq!(fa.len(), 4);
        assert_eq!(fb.len(), 4);
    }

    #[test]
    fn touching_vertex_splits_the_other_edge() {
        let a = shape_edges(&[square(0.0, 0.0, 2.0)]);
        let b = shape_edges(&[square(0.5, 2.0, 1.0)]);
        let (fa, _) = split_edges(&a, &b, 1e-9);
        // Top edge of A is cut at x = 1.5 and x = 0.5.
        assert_eq!(fa.len(), 6);
    }
}
