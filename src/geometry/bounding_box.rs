use crate::math::Point2;

/// Axis-aligned bounding box in the plan.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox {
    /// An empty box that absorbs any point or box it is merged with.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing all `points` (empty for no points).
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Self {
        points.into_iter().fold(Self::empty(), |b, p| b.including(p))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Returns this box grown to include `p`.
    #[must_use]
    pub fn including(&self, p: &Point2) -> Self {
        Self {
            min: Point2::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point2::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Returns this box grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self {
            min: Point2::new(self.min.x - margin, self.min.y - margin),
            max: Point2::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Overlap test where touching within `tolerance` counts as overlapping.
    #[must_use]
    pub fn overlaps(&self, other: &Self, tolerance: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.max.x + tolerance
            && other.min.x <= self.max.x + tolerance
            && self.min.y <= other.max.y + tolerance
            && other.min.y <= self.max.y + tolerance
    }

    #[must_use]
    pub fn contains(&self, p: &Point2, tolerance: f64) -> bool {
        p.x >= self.min.x - tolerance
            && p.x <= self.max.x + tolerance
            && p.y >= self.min.y - tolerance
            && p.y <= self.max.y + tolerance
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.x - self.min.x }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max.y - self.min.y }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[must_use]
    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Length of the diagonal, a scale measure for the box contents.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_covers_all() {
        let pts = [Point2::new(1.0, 5.0), Point2::new(-2.0, 3.0), Point2::new(4.0, -1.0)];
        let b = BoundingBox::from_points(&pts);
        assert_eq!(b.min, Point2::new(-2.0, -1.0));
        assert_eq!(b.max, Point2::new(4.0, 5.0));
        assert!((b.area() - 36.0).abs() < 1e-12);
    }

    #[test]
    fn touching_boxes_overlap_within_tolerance() {
        let a = BoundingBox::from_points(&[Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]);
        let b = BoundingBox::from_points(&[Point2::new(1.05, 0.0), Point2::new(2.0, 1.0)]);
        assert!(!a.overlaps(&b, 0.01));
        assert!(a.overlaps(&b, 0.1));
    }

    #[test]
    fn empty_box_never_overlaps() {
        let a = BoundingBox::empty();
        let b = BoundingBox::from_points(&[Point2::new(0.0, 0.0)]);
        assert!(a.is_empty());
        assert!(!a.overlaps(&b, 1.0));
        assert!((a.area()).abs() < f64::EPSILON);
    }
}
