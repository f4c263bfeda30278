//! Binary CART tree used as the forest's base learner.
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::config::Criterion;

/// Tree node; leaves hold the positive-class fraction of their samples and
/// splits refer to their children by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        proba: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a flat node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Positive-class probability for one sample.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { proba, .. } => return *proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(0usize, 0usize)];
        while let Some((node, depth)) = pending.pop() {
            match &self.nodes[node] {
                TreeNode::Leaf { .. } => deepest = deepest.max(depth),
                TreeNode::Split { left, right, .. } => {
                    pending.push((*left, depth + 1));
                    pending.push((*right, depth + 1));
                }
            }
        }
        deepest
    }
}

/// Growth settings for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeSettings {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split.
    pub max_features: usize,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

struct PendingNode {
    indices: Vec<usize>,
    depth: usize,
    parent: Option<(usize, Side)>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Grows one tree over `x`/`y` (labels encoded 0/1).
pub struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    settings: TreeSettings,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(x: &'a Array2<f64>, y: &'a [usize], settings: TreeSettings) -> Self {
        Self { x, y, settings }
    }

    /// Grow a tree on `indices`; repeated indices act as sample weights.
    ///
    /// Nodes are built depth first from an explicit work stack, so deep
    /// trees never exhaust the thread's call stack.
    pub fn build(&self, indices: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut pending = vec![PendingNode {
            indices,
            depth: 0,
            parent: None,
        }];

        while let Some(PendingNode {
            indices,
            depth,
            parent,
        }) = pending.pop()
        {
            let id = nodes.len();
            if let Some((parent_id, side)) = parent {
                if let TreeNode::Split { left, right, .. } = &mut nodes[parent_id] {
                    match side {
                        Side::Left => *left = id,
                        Side::Right => *right = id,
                    }
                }
            }

            let n = indices.len();
            let positives = indices.iter().filter(|&&i| self.y[i] == 1).count();
            nodes.push(TreeNode::Leaf {
                proba: if n == 0 { 0.0 } else { positives as f64 / n as f64 },
                n_samples: n,
            });

            let depth_reached = self.settings.max_depth.map_or(false, |d| depth >= d);
            if depth_reached
                || n < self.settings.min_samples_split
                || n < 2 * self.settings.min_samples_leaf
                || positives == 0
                || positives == n
            {
                continue;
            }

            let Some(best) = self.find_best_split(&indices, positives, rng) else {
                continue;
            };
            log::trace!(
                "split depth={} feature={} threshold={} impurity={:.4}",
                depth,
                best.feature,
                best.threshold,
                best.impurity
            );

            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .into_iter()
                .partition(|&i| self.x[[i, best.feature]] <= best.threshold);
            nodes[id] = TreeNode::Split {
                feature: best.feature,
                threshold: best.threshold,
                left: id,
                right: id,
            };
            // right goes first so the left subtree is built next
            pending.push(PendingNode {
                indices: right,
                depth: depth + 1,
                parent: Some((id, Side::Right)),
            });
            pending.push(PendingNode {
                indices: left,
                depth: depth + 1,
                parent: Some((id, Side::Left)),
            });
        }

        DecisionTree { nodes }
    }

    /// Best split over randomly drawn features. Features that are constant
    /// on the node do not count towards `max_features`, so drawing goes on
    /// until enough informative features were tried or none remain.
    fn find_best_split(&self, indices: &[usize], positives: usize, rng: &mut StdRng) -> Option<BestSplit> {
        let n = indices.len();
        let n_features = self.x.ncols();
        let min_leaf = self.settings.min_samples_leaf;
        let max_features = self.settings.max_features.min(n_features);
        let draw_order = index::sample(rng, n_features, n_features);

        let mut best: Option<BestSplit> = None;
        let mut order: Vec<usize> = indices.to_vec();
        let mut tried = 0;

        for feature in draw_order.iter() {
            if tried >= max_features {
                break;
            }
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            if self.x[[order[0], feature]] >= self.x[[order[n - 1], feature]] {
                continue;
            }
            tried += 1;

            let mut left_pos = 0usize;
            for split in 0..n - 1 {
                if self.y[order[split]] == 1 {
                    left_pos += 1;
                }
                let n_left = split + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[[order[split], feature]];
                let next = self.x[[order[split + 1], feature]];
                if here >= next {
                    continue;
                }

                let impurity = (n_left as f64 * self.impurity(left_pos, n_left)
                    + n_right as f64 * self.impurity(positives - left_pos, n_right))
                    / n as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mid = here + (next - here) / 2.0;
                    best = Some(BestSplit {
                        feature,
                        threshold: if mid < next { mid } else { here },
                        impurity,
                    });
                }
            }
        }

        best
    }

    fn impurity(&self, positives: usize, n: usize) -> f64 {
        let p = positives as f64 / n as f64;
        let q = 1.0 - p;
        match self.settings.criterion {
            Criterion::Gini => 1.0 - p * p - q * q,
            Criterion::Entropy => {
                let h = |v: f64| if v > 0.0 { -v * v.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    fn settings() -> TreeSettings {
        TreeSettings {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn test_tree_separates_threshold_data() {
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![0.0, 5.0, 1.0, 5.0, 2.0, 5.0, 10.0, 5.0, 11.0, 5.0, 12.0, 5.0],
        )
        .unwrap();
        let y = vec![0, 0, 0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = TreeBuilder::new(&x, &y, settings()).build((0..6).collect(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_row(x.row(0)), 0.0);
        assert_eq!(tree.predict_row(x.row(5)), 1.0);
    }

    #[test]
    fn test_max_depth_zero_gives_prior() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = vec![0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = TreeBuilder::new(
            &x,
            &y,
            TreeSettings {
                max_depth: Some(0),
                max_features: 1,
                ..settings()
            },
        )
        .build((0..4).collect(), &mut rng);
        assert!((tree.predict_row(x.row(0)) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_children() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = vec![0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = TreeBuilder::new(
            &x,
            &y,
            TreeSettings {
                min_samples_leaf: 2,
                max_features: 1,
                ..settings()
            },
        )
        .build((0..4).collect(), &mut rng);
        // only the 2/2 split is allowed, and its right child is pure
        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(x.row(0)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_features_do_not_use_up_the_draw() {
        // features 0 and 1 are constant, only feature 2 separates the classes
        let x = Array2::from_shape_fn((8, 3), |(i, j)| if j == 2 { i as f64 } else { 1.0 });
        let y: Vec<usize> = (0..8).map(|i| usize::from(i >= 4)).collect();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = TreeBuilder::new(
                &x,
                &y,
                TreeSettings {
                    max_features: 1,
                    ..settings()
                },
            )
            .build((0..8).collect(), &mut rng);
            assert_eq!(tree.depth(), 1, "seed {}", seed);
            assert_eq!(tree.predict_row(x.row(0)), 0.0);
            assert_eq!(tree.predict_row(x.row(7)), 1.0);
        }
    }

    #[test]
    fn test_deep_tree_builds_without_recursion() {
        // alternating labels on one feature need a split between every pair
        let n = 4000;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let mut rng = StdRng::seed_from_u64(1234);
        let tree = TreeBuilder::new(
            &x,
            &y,
            TreeSettings {
                max_features: 1,
                ..settings()
            },
        )
        .build((0..n).collect(), &mut rng);

        assert_eq!(tree.n_nodes(), 2 * n - 1);
        for i in [0, 1, n / 2, n - 2, n - 1] {
            assert_eq!(tree.predict_row(x.row(i)), y[i] as f64);
        }
    }
}
