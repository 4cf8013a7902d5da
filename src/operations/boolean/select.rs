use std::fmt;

use super::classify::FragmentClass;
use super::split::ShapeSource;

/// The boolean operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BooleanOp {
    Union,
    Intersection,
    /// A minus B.
    Difference,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Union => "union",
            Self::Intersection => "intersection",
            Self::Difference => "difference",
        })
    }
}

/// Decision about whether to keep a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepDecision {
    Keep,
    KeepReversed,
    Discard,
}

/// Determines whether an edge fragment belongs to the result boundary.
///
/// | Fragment | vs other        | Union   | Intersection | Difference (A-B) |
/// |----------|-----------------|---------|--------------|------------------|
/// | from A   | outside B       | keep    | discard      | keep             |
/// | from A   | inside B        | discard | keep         | discard          |
/// | from A   | shared          | keep    | keep         | discard          |
/// | from A   | shared opposite | discard | discard      | keep             |
/// | from B   | outside A       | keep    | discard      | discard          |
/// | from B   | inside A        | discard | keep         | keep (reversed)  |
/// | from B   | on boundary     | discard | discard      | discard          |
///
/// Shared edges are taken from A only, so each appears once.
#[allow(clippy::match_same_arms)]
#[must_use]
pub fn should_keep_fragment(source: ShapeSource, class: FragmentClass, op: BooleanOp) -> KeepDecision {
    match (source, class, op) {
        (ShapeSource::A, FragmentClass::Outside, BooleanOp::Union) => KeepDecision::Keep,
        (ShapeSource::A, FragmentClass::Outside, BooleanOp::Intersection) => KeepDecision::Discard,
        (ShapeSource::A, FragmentClass::Outside, BooleanOp::Difference) => KeepDecision::Keep,

        (ShapeSource::A, FragmentClass::Inside, BooleanOp::Union) => KeepDecision::Discard,
        (ShapeSource::A, FragmentClass::Inside, BooleanOp::Intersection) => KeepDecision::Keep,
        (ShapeSource::A, FragmentClass::Inside, BooleanOp::Difference) => KeepDecision::Discard,

        (ShapeSource::A, FragmentClass::Shared, BooleanOp::Union) => KeepDecision::Keep,
        (ShapeSource::A, FragmentClass::Shared, BooleanOp::Intersection) => KeepDecision::Keep,
        (ShapeSource::A, FragmentClass::Shared, BooleanOp::Difference) => KeepDecision::Discard,

        (ShapeSource::A, FragmentClass::SharedOpposite, BooleanOp::Union) => KeepDecision::Discard,
        (ShapeSource::A, FragmentClass::SharedOpposite, BooleanOp::Intersection) => KeepDecision::Discard,
        (ShapeSource::A, FragmentClass::SharedOpposite, BooleanOp::Difference) => KeepDecision::Keep,

        (ShapeSource::B, FragmentClass::Outside, BooleanOp::Union) => KeepDecision::Keep,
        (ShapeSource::B, FragmentClass::Outside, BooleanOp::Intersection) => KeepDecision::Discard,
        (ShapeSource::B, FragmentClass::Outside, BooleanOp::Difference) => KeepDecision::Discard,

        (ShapeSource::B, FragmentClass::Inside, BooleanOp::Union) => KeepDecision::Discard,
        (ShapeSource::B, FragmentClass::Inside, BooleanOp::Intersection) => KeepDecision::Keep,
        (ShapeSource::B, FragmentClass::Inside, BooleanOp::Difference) => KeepDecision::KeepReversed,

        (ShapeSource::B, FragmentClass::Shared | FragmentClass::SharedOpposite, _) => KeepDecision::Discard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_outside_fragments() {
        assert_eq!(
            should_keep_fragment(ShapeSource::A, FragmentClass::Outside, BooleanOp::Union),
            KeepDecision::Keep
        );
        assert_eq!(
            should_keep_fragment(ShapeSource::B, FragmentClass::Outside, BooleanOp::Union),
            KeepDecision::Keep
        );
        assert_eq!(
            should_keep_fragment(ShapeSource::B, FragmentClass::Inside, BooleanOp::Union),
            KeepDecision::Discard
        );
    }

    #[test]
    fn difference_reverses_b_inside() {
        assert_eq!(
            should_keep_fragment(ShapeSource::B, FragmentClass::Inside, BooleanOp::Difference),
            KeepDecision::KeepReversed
        );
        assert_eq!(
            should_keep_fragment(ShapeSource::A, FragmentClass::SharedOpposite, BooleanOp::Difference),
            KeepDecision::Keep
        );
    }

    #[test]
    fn shared_edges_come_from_a_once() {
        for op in [BooleanOp::Union, BooleanOp::Intersection, BooleanOp::Difference] {
            assert_eq!(
                should_keep_fragment(ShapeSource::B, FragmentClass::Shared, op),
                KeepDecision::Discard
            );
        }
        assert_eq!(
            should_keep_fragment(ShapeSource::A, FragmentClass::Shared, BooleanOp::Intersection),
            KeepDecision::Keep
        );
    }

    #[test]
    fn op_names() {
        assert_eq!(BooleanOp::Difference.to_string(), "difference");
    }
}
