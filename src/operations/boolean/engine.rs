use crate::error::{GeometricError, Result};
use crate::geometry::{BoundingBox, Polygon};

use super::assemble::assemble_rings;
use super::classify::Operand;
use super::select::{should_keep_fragment, BooleanOp, KeepDecision};
use super::split::{shape_edges, split_edges, EdgeFragment};

/// Result polygons of one boolean execution and the warnings raised
/// while assembling them.
#[derive(Debug, Default)]
pub struct Outcome {
    pub polygons: Vec<Polygon>,
    pub warnings: Vec<String>,
}

fn shape_bbox(shape: &[Polygon]) -> BoundingBox {
    shape
        .iter()
        .fold(BoundingBox::empty(), |b, p| b.union(&p.bounding_box()))
}

fn check_operand(shape: &[Polygon], name: &str, tolerance: f64) -> Result<()> {
    for (i, polygon) in shape.iter().enumerate() {
        if polygon.self_intersects() {
            return Err(GeometricError::boolean_failure(format!(
                "operand {name} polygon {i} is self-intersecting"
            )));
        }
        if polygon.area() <= tolerance * tolerance {
            return Err(GeometricError::boolean_failure(format!(
                "operand {name} polygon {i} has zero area"
            )));
        }
    }
    Ok(())
}

/// Executes a boolean operation on two shapes.
///
/// Orchestrates the full pipeline: edge splitting, classification,
/// selection, and ring assembly. Polygons within one shape must not overlap
/// each other.
///
/// # Errors
///
/// `boolean_failure` when an input polygon is self-intersecting or has zero
/// area.
pub fn boolean_execute(a: &[Polygon], b: &[Polygon], op: BooleanOp, tolerance: f64) -> Result<Outcome> {
    check_operand(a, "A", tolerance)?;
    check_operand(b, "B", tolerance)?;

    // Disjoint or empty operands need no splitting.
    if a.is_empty() || b.is_empty() || !shape_bbox(a).overlaps(&shape_bbox(b), tolerance) {
        let polygons = match op {
            BooleanOp::Union => a.iter().chain(b).cloned().collect(),
            BooleanOp::Intersection => Vec::new(),
            BooleanOp::Difference => a.to_vec(),
        };
        tracing::debug!(%op, "disjoint operands");
        return Ok(Outcome {
            polygons,
            warnings: Vec::new(),
        });
    }

    let edges_a = shape_edges(a);
    let edges_b = shape_edges(b);
    let (fragments_a, fragments_b) = split_edges(&edges_a, &edges_b, tolerance);

    let operand_a = Operand {
        edges: &edges_a,
        rings: a.iter().flat_map(Polygon::rings).collect(),
    };
    let operand_b = Operand {
        edges: &edges_b,
        rings: b.iter().flat_map(Polygon::rings).collect(),
    };

    let decide = |fragment: &EdgeFragment, other: &Operand<'_>| {
        let class = other.classify(fragment, tolerance);
        (*fragment, should_keep_fragment(fragment.source, class, op))
    };
    let decided: Vec<(EdgeFragment, KeepDecision)> = fragments_a
        .iter()
        .map(|f| decide(f, &operand_b))
        .chain(fragments_b.iter().map(|f| decide(f, &operand_a)))
        .collect();

    let kept = decided.iter().filter(|(_, d)| *d != KeepDecision::Discard).count();
    tracing::debug!(%op, fragments = decided.len(), kept, "classified fragments");

    let assembly = assemble_rings(&decided, tolerance);
    let mut warnings = assembly.warnings;
    if assembly.polygons.is_empty() {
        warnings.push(format!("{op} produced an empty result"));
    }
    Ok(Outcome {
        polygons: assembly.polygons,
        warnings,
    })
}
