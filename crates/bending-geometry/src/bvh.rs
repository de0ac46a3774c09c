//! Bounding-volume hierarchy for broad-phase collision culling.
//!
//! The tree is rebuilt from scratch every collision pass: colliders move every
//! tick, and a rebuild over a few hundred leaves is cheaper than refitting.
//!
//! Construction sorts leaves by the Morton code of their centers and then
//! splits each sorted range at its midpoint. Neighbouring Morton codes are
//! spatially close, so the halves stay compact without any surface-area
//! heuristic.

use serde::{Deserialize, Serialize};

use crate::morton;
use crate::Aabb;

/// A tree node. Children and leaves are referenced by index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf { bounds: Aabb, leaf: usize },
    Internal { bounds: Aabb, left: usize, right: usize },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Self::Leaf { bounds, .. } | Self::Internal { bounds, .. } => bounds,
        }
    }
}

/// A leaf of the hierarchy: its bounds and the payload it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf<T> {
    /// Leaf bounds
    pub bounds: Aabb,
    /// Caller payload (usually an index into the caller's collider list)
    pub item: T,
}

/// Static bounding-volume hierarchy over `T` payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bvh<T> {
    nodes: Vec<Node>,
    leaves: Vec<Leaf<T>>,
    root: Option<usize>,
}

impl<T> Bvh<T> {
    /// Build a hierarchy from `(bounds, payload)` pairs.
    #[must_use]
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (Aabb, T)>,
    {
        let mut leaves: Vec<Leaf<T>> = items
            .into_iter()
            .map(|(bounds, item)| Leaf { bounds, item })
            .collect();

        let Some(scene) = leaves
            .iter()
            .map(|leaf| Aabb::new(leaf.bounds.center(), leaf.bounds.center()))
            .reduce(|a, b| a.union(&b))
        else {
            return Self {
                nodes: Vec::new(),
                leaves,
                root: None,
            };
        };

        leaves.sort_by_cached_key(|leaf| morton::encode_in(leaf.bounds.center(), &scene));

        let mut nodes = Vec::with_capacity(leaves.len() * 2);
        let root = Self::build_range(&leaves, 0, leaves.len(), &mut nodes);
        Self {
            nodes,
            leaves,
            root: Some(root),
        }
    }

    fn build_range(leaves: &[Leaf<T>], start: usize, end: usize, nodes: &mut Vec<Node>) -> usize {
        if end - start == 1 {
            nodes.push(Node::Leaf {
                bounds: leaves[start].bounds,
                leaf: start,
            });
            return nodes.len() - 1;
        }
        let mid = start + (end - start) / 2;
        let left = Self::build_range(leaves, start, mid, nodes);
        let right = Self::build_range(leaves, mid, end, nodes);
        let bounds = nodes[left].bounds().union(nodes[right].bounds());
        nodes.push(Node::Internal {
            bounds,
            left,
            right,
        });
        nodes.len() - 1
    }

    /// Number of leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns true if the tree has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Bounds of the whole tree, if any leaves exist.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.map(|root| *self.nodes[root].bounds())
    }

    /// Leaves in Morton order.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf<T>> + '_ {
        self.leaves.iter()
    }

    /// Payloads whose bounds overlap `area`.
    #[must_use]
    pub fn query(&self, area: &Aabb) -> Vec<&T> {
        let mut hits = Vec::new();
        self.visit(area, |leaf| hits.push(&self.leaves[leaf].item));
        hits
    }

    /// Every unordered pair of payloads whose bounds overlap, each reported once.
    #[must_use]
    pub fn query_all(&self) -> Vec<(&T, &T)> {
        let mut pairs = Vec::new();
        for (index, leaf) in self.leaves.iter().enumerate() {
            self.visit(&leaf.bounds, |other| {
                if other > index {
                    pairs.push((&leaf.item, &self.leaves[other].item));
                }
            });
        }
        pairs
    }

    /// Depth-first walk calling `hit` with the index of every overlapping leaf.
    fn visit<F>(&self, area: &Aabb, mut hit: F)
    where
        F: FnMut(usize),
    {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bounds().intersects(area) {
                continue;
            }
            match *node {
                Node::Leaf { leaf, .. } => hit(leaf),
                Node::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }
}

impl<T> Default for Bvh<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            root: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn unit_box(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::block(Vec3::new(x, y, z))
    }

    fn brute_force(boxes: &[Aabb]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].intersects(&boxes[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn normalized(pairs: Vec<(&usize, &usize)>) -> Vec<(usize, usize)> {
        let mut out: Vec<_> = pairs
            .into_iter()
            .map(|(a, b)| if a < b { (*a, *b) } else { (*b, *a) })
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn empty_tree_has_no_pairs() {
        let bvh: Bvh<usize> = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert!(bvh.bounds().is_none());
        assert!(bvh.query_all().is_empty());
        assert!(bvh.query(&Aabb::block(Vec3::ZERO)).is_empty());
    }

    #[test]
    fn single_leaf_never_pairs_with_itself() {
        let bvh = Bvh::build(vec![(unit_box(0.0, 0.0, 0.0), 7usize)]);
        assert_eq!(bvh.len(), 1);
        assert!(bvh.query_all().is_empty());
        assert_eq!(bvh.query(&unit_box(0.5, 0.5, 0.5)), vec![&7]);
    }

    #[test]
    fn query_all_reports_each_pair_once() {
        let boxes = vec![
            unit_box(0.0, 0.0, 0.0),
            unit_box(0.5, 0.0, 0.0),
            unit_box(0.9, 0.0, 0.0),
            unit_box(10.0, 0.0, 0.0),
        ];
        let bvh = Bvh::build(boxes.iter().copied().enumerate().map(|(i, b)| (b, i)));
        assert_eq!(normalized(bvh.query_all()), vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn bounds_cover_every_leaf() {
        let bvh = Bvh::build(vec![
            (unit_box(-5.0, 0.0, 0.0), 'a'),
            (unit_box(5.0, 3.0, -2.0), 'b'),
        ]);
        let bounds = bvh.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(-5.0, 0.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(6.0, 4.0, 1.0));
    }

    #[test]
    fn matches_brute_force_on_random_scene() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let boxes: Vec<Aabb> = (0..200)
            .map(|_| {
                let center = Vec3::new(
                    rng.gen_range(-30.0..30.0),
                    rng.gen_range(-30.0..30.0),
                    rng.gen_range(-30.0..30.0),
                );
                Aabb::from_center(center, Vec3::splat(rng.gen_range(0.2..2.0)))
            })
            .collect();
        let bvh = Bvh::build(boxes.iter().copied().enumerate().map(|(i, b)| (b, i)));
        assert_eq!(normalized(bvh.query_all()), brute_force(&boxes));
    }

    proptest! {
        #[test]
        fn query_all_equals_brute_force(
            centers in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0), 0..40)
        ) {
            let boxes: Vec<Aabb> = centers
                .iter()
                .map(|&(x, y, z)| Aabb::from_center(Vec3::new(x, y, z), Vec3::splat(1.0)))
                .collect();
            let bvh = Bvh::build(boxes.iter().copied().enumerate().map(|(i, b)| (b, i)));
            prop_assert_eq!(normalized(bvh.query_all()), brute_force(&boxes));
        }
    }
}
