use slotmap::SlotMap;

use crate::geometry::BoundingBox;
use crate::math::Point2;

slotmap::new_key_type! {
    /// Handle of a node in a [`SpatialIndex`].
    pub struct NodeId;
}

/// Items per leaf before a node is split.
const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        bbox: BoundingBox,
        items: Vec<usize>,
    },
    Branch {
        bbox: BoundingBox,
        left: NodeId,
        right: NodeId,
    },
}

impl Node {
    fn bbox(&self) -> &BoundingBox {
        match self {
            Self::Leaf { bbox, .. } | Self::Branch { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume hierarchy over a fixed set of boxes.
///
/// Nodes live in an arena and refer to their children by [`NodeId`]. Items
/// are reported by their index in the slice the index was built from.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    nodes: SlotMap<NodeId, Node>,
    root: Option<NodeId>,
    boxes: Vec<BoundingBox>,
}

impl SpatialIndex {
    /// Builds the hierarchy by median splits along the wider axis of the
    /// box centers.
    #[must_use]
    pub fn build(boxes: Vec<BoundingBox>) -> Self {
        let mut index = Self {
            nodes: SlotMap::with_key(),
            root: None,
            boxes,
        };
        let items: Vec<usize> = (0..index.boxes.len())
            .filter(|&i| !index.boxes[i].is_empty())
            .collect();
        if !items.is_empty() {
            index.root = Some(index.build_node(items));
        }
        index
    }

    fn build_node(&mut self, mut items: Vec<usize>) -> NodeId {
        let bbox = items
            .iter()
            .fold(BoundingBox::empty(), |b, &i| b.union(&self.boxes[i]));
        if items.len() <= LEAF_SIZE {
            return self.nodes.insert(Node::Leaf { bbox, items });
        }

        let center_points: Vec<Point2> = items.iter().map(|&i| self.boxes[i].center()).collect();
        let centers = BoundingBox::from_points(&center_points);
        let split_x = centers.width() >= centers.height();
        let key = |b: &BoundingBox| if split_x { b.center().x } else { b.center().y };

        let mid = items.len() / 2;
        let boxes = &self.boxes;
        items.select_nth_unstable_by(mid, |&a, &b| key(&boxes[a]).total_cmp(&key(&boxes[b])));
        let right_items = items.split_off(mid);

        let left = self.build_node(items);
        let right = self.build_node(right_items);
        self.nodes.insert(Node::Branch { bbox, left, right })
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Depth of the hierarchy; 0 when empty.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &SlotMap<NodeId, Node>, id: NodeId) -> usize {
            match nodes.get(id) {
                Some(Node::Branch { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Some(Node::Leaf { .. }) => 1,
                None => 0,
            }
        }
        self.root.map_or(0, |r| walk(&self.nodes, r))
    }

    /// Indices of all items whose box overlaps `bbox` within `tolerance`,
    /// in ascending order.
    #[must_use]
    pub fn query(&self, bbox: &BoundingBox, tolerance: f64) -> Vec<usize> {
        let mut hits = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.bbox().overlaps(bbox, tolerance) {
                continue;
            }
            match node {
                Node::Leaf { items, .. } => hits.extend(
                    items
                        .iter()
                        .copied()
                        .filter(|&i| self.boxes[i].overlaps(bbox, tolerance)),
                ),
                Node::Branch { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    /// Every pair `(i, j)` with `i < j` whose boxes overlap within
    /// `tolerance`, sorted.
    #[must_use]
    pub fn candidate_pairs(&self, tolerance: f64) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, bbox) in self.boxes.iter().enumerate() {
            if bbox.is_empty() {
                continue;
            }
            pairs.extend(
                self.query(bbox, tolerance)
                    .into_iter()
                    .filter(|&j| j > i)
                    .map(|j| (i, j)),
            );
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f64, y: f64) -> BoundingBox {
        BoundingBox {
            min: Point2::new(x, y),
            max: Point2::new(x + 1.0, y + 1.0),
        }
    }

    #[test]
    fn grid_pairs_match_brute_force() {
        let boxes: Vec<BoundingBox> = (0..40)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let (x, y) = ((i % 8) as f64 * 1.5, (i / 8) as f64 * 0.9);
                unit_box(x, y)
            })
            .collect();
        let index = SpatialIndex::build(boxes.clone());
        assert!(index.depth() > 1);

        let mut brute = Vec::new();
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if boxes[i].overlaps(&boxes[j], 0.0) {
                    brute.push((i, j));
                }
            }
        }
        assert_eq!(index.candidate_pairs(0.0), brute);
    }

    #[test]
    fn query_respects_tolerance() {
        let index = SpatialIndex::build(vec![unit_box(0.0, 0.0), unit_box(1.05, 0.0), unit_box(10.0, 10.0)]);
        assert_eq!(index.query(&unit_box(0.0, 0.0), 0.0), vec![0]);
        assert_eq!(index.query(&unit_box(0.0, 0.0), 0.1), vec![0, 1]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn empty_index() {
        let index = SpatialIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.depth(), 0);
        assert!(index.candidate_pairs(1.0).is_empty());
    }
}
