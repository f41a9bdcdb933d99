//! CART decision trees shared by the random-forest classifier and regressor.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Node statistics driving split selection.
///
/// Implementations accumulate targets incrementally so that a sorted sweep
/// over a feature evaluates every threshold in linear time.
pub trait SplitCriterion: Clone + Send + Sync {
    type Target: Copy + Send + Sync;
    type Leaf: Clone + Send + Sync;

    /// Fresh accumulator with the same shape as `self`
    fn empty(&self) -> Self;
    fn push(&mut self, target: Self::Target);
    fn pop(&mut self, target: Self::Target);
    fn count(&self) -> usize;
    fn impurity(&self) -> f64;
    fn leaf(&self) -> Self::Leaf;
}

/// Gini impurity over class indices; leaves hold class proportions
#[derive(Debug, Clone)]
pub struct Gini {
    counts: Vec<usize>,
    total: usize,
    sum_sq: usize,
}

impl Gini {
    pub fn new(n_classes: usize) -> Self {
        Self {
            counts: vec![0; n_classes],
            total: 0,
            sum_sq: 0,
        }
    }
}

impl SplitCriterion for Gini {
    type Target = usize;
    type Leaf = Vec<f64>;

    fn empty(&self) -> Self {
        Gini::new(self.counts.len())
    }

    fn push(&mut self, class: usize) {
        let c = self.counts[class];
        // (c + 1)^2 - c^2
        self.sum_sq += 2 * c + 1;
        self.counts[class] = c + 1;
        self.total += 1;
    }

    fn pop(&mut self, class: usize) {
        let c = self.counts[class];
        if c == 0 {
            return;
        }
        self.sum_sq -= 2 * c - 1;
        self.counts[class] = c - 1;
        self.total -= 1;
    }

    fn count(&self) -> usize {
        self.total
    }

    fn impurity(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        1.0 - self.sum_sq as f64 / (n * n)
    }

    fn leaf(&self) -> Vec<f64> {
        let n = self.total.max(1) as f64;
        self.counts.iter().map(|&c| c as f64 / n).collect()
    }
}

/// Variance (mean squared error) over real targets; leaves hold the mean
#[derive(Debug, Clone, Default)]
pub struct Variance {
    sum: f64,
    sum_sq: f64,
    total: usize,
}

impl SplitCriterion for Variance {
    type Target = f64;
    type Leaf = f64;

    fn empty(&self) -> Self {
        Variance::default()
    }

    fn push(&mut self, y: f64) {
        self.sum += y;
        self.sum_sq += y * y;
        self.total += 1;
    }

    fn pop(&mut self, y: f64) {
        self.sum -= y;
        self.sum_sq -= y * y;
        self.total = self.total.saturating_sub(1);
    }

    fn count(&self) -> usize {
        self.total
    }

    fn impurity(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }

    fn leaf(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.sum / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<L> {
    /// Rows with `sample[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(L),
}

/// Arena-allocated binary tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree<L> {
    nodes: Vec<Node<L>>,
}

impl<L> DecisionTree<L> {
    /// Route a sample to its leaf.
    ///
    /// Returns `None` for a malformed tree (dangling child index, cycle) or a
    /// sample too short for a split feature.
    pub fn leaf_for(&self, sample: &[f64]) -> Option<&L> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if *sample.get(*feature)? <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf(value) => return Some(value),
            }
        }
        None
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Largest feature index used by any split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf(_) => None,
            })
            .max()
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn per split
    pub max_features: usize,
}

/// Grow one tree on the given rows (duplicates allowed, e.g. a bootstrap sample).
///
/// Returns the tree and its unnormalised impurity decrease per feature.
pub fn fit_tree<C: SplitCriterion>(
    x: ArrayView2<'_, f64>,
    y: &[C::Target],
    rows: Vec<usize>,
    prototype: &C,
    params: &TreeParams,
    seed: u64,
) -> (DecisionTree<C::Leaf>, Vec<f64>) {
    let mut builder = TreeBuilder {
        x,
        y,
        prototype,
        params,
        nodes: Vec::new(),
        importances: vec![0.0; x.ncols()],
        rng: StdRng::seed_from_u64(seed),
    };
    builder.grow(rows, 0);

    (
        DecisionTree {
            nodes: builder.nodes,
        },
        builder.importances,
    )
}

struct TreeBuilder<'a, 'x, C: SplitCriterion> {
    x: ArrayView2<'x, f64>,
    y: &'a [C::Target],
    prototype: &'a C,
    params: &'a TreeParams,
    nodes: Vec<Node<C::Leaf>>,
    importances: Vec<f64>,
    rng: StdRng,
}

struct Split {
    feature: usize,
    threshold: f64,
    /// n_left × I_left + n_right × I_right
    weighted_impurity: f64,
}

impl<'a, 'x, C: SplitCriterion> TreeBuilder<'a, 'x, C> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mut stats = self.prototype.empty();
        for &row in &rows {
            stats.push(self.y[row]);
        }
        let impurity = stats.impurity();

        let stop = depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split.max(2)
            || rows.len() < 2 * self.params.min_samples_leaf.max(1)
            || impurity <= f64::EPSILON;
        if stop {
            return self.push_leaf(stats.leaf());
        }

        let Some(split) = self.best_split(&rows, &stats) else {
            return self.push_leaf(stats.leaf());
        };

        let decrease = rows.len() as f64 * impurity - split.weighted_impurity;
        self.importances[split.feature] += decrease.max(0.0);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| self.x[[row, split.feature]] <= split.threshold);

        // reserve the slot so children get higher indices
        let idx = self.push_leaf(stats.leaf());
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn push_leaf(&mut self, leaf: C::Leaf) -> usize {
        self.nodes.push(Node::Leaf(leaf));
        self.nodes.len() - 1
    }

    fn best_split(&mut self, rows: &[usize], parent: &C) -> Option<Split> {
        let n_features = self.x.ncols();
        let n_candidates = self.params.max_features.clamp(1, n_features);
        let candidates = index::sample(&mut self.rng, n_features, n_candidates);
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<Split> = None;
        let mut order: Vec<(f64, usize)> = Vec::with_capacity(rows.len());

        for feature in candidates.iter() {
            order.clear();
            order.extend(rows.iter().map(|&row| (self.x[[row, feature]], row)));
            order.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = parent.empty();
            let mut right = parent.clone();

            for i in 0..order.len() - 1 {
                let (value, row) = order[i];
                left.push(self.y[row]);
                right.pop(self.y[row]);

                let next = order[i + 1].0;
                if next <= value {
                    continue;
                }
                if left.count() < min_leaf || right.count() < min_leaf {
                    continue;
                }

                let weighted = left.count() as f64 * left.impurity()
                    + right.count() as f64 * right.impurity();
                if best.as_ref().map_or(true, |b| weighted < b.weighted_impurity) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        weighted_impurity: weighted,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn test_gini_incremental_matches_definition() {
        let mut gini = Gini::new(3);
        for class in [0, 0, 1, 2, 2, 2] {
            gini.push(class);
        }
        // 1 - (4 + 1 + 9) / 36
        assert!((gini.impurity() - (1.0 - 14.0 / 36.0)).abs() < 1e-12);

        gini.pop(2);
        gini.pop(2);
        gini.pop(2);
        // {0, 0, 1}: 1 - (4 + 1) / 9
        assert!((gini.impurity() - (1.0 - 5.0 / 9.0)).abs() < 1e-12);
        assert_eq!(gini.leaf(), vec![2.0 / 3.0, 1.0 / 3.0, 0.0]);
    }

    #[test]
    fn test_variance_of_constant_is_zero() {
        let mut variance = Variance::default();
        for _ in 0..5 {
            variance.push(8.0);
        }
        assert_eq!(variance.impurity(), 0.0);
        assert_eq!(variance.leaf(), 8.0);
    }

    #[test]
    fn test_classification_tree_separates_classes() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [10.0, 0.0], [11.0, 0.0], [12.0, 0.0]];
        let y = vec![0, 0, 0, 1, 1, 1];

        let (tree, importances) = fit_tree(x.view(), &y, (0..6).collect(), &Gini::new(2), &params(5), 7);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.leaf_for(&[2.5, 0.0]), Some(&vec![1.0, 0.0]));
        assert_eq!(tree.leaf_for(&[11.5, 0.0]), Some(&vec![0.0, 1.0]));
        // split lands on the midpoint between 3 and 10
        assert_eq!(tree.leaf_for(&[6.5, 0.0]), Some(&vec![1.0, 0.0]));
        assert_eq!(tree.leaf_for(&[6.6, 0.0]), Some(&vec![0.0, 1.0]));

        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_regression_tree_respects_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let (stump, _) = fit_tree(x.view(), &y, (0..8).collect(), &Variance::default(), &params(1), 1);
        assert_eq!(stump.n_nodes(), 3);
        assert_eq!(stump.leaf_for(&[1.0]), Some(&2.5));
        assert_eq!(stump.leaf_for(&[8.0]), Some(&6.5));

        let (deep, _) = fit_tree(x.view(), &y, (0..8).collect(), &Variance::default(), &params(10), 1);
        assert_eq!(deep.n_leaves(), 8);
        assert_eq!(deep.leaf_for(&[3.0]), Some(&3.0));
    }

    #[test]
    fn test_pure_node_is_a_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = vec![8.0, 8.0, 8.0];
        let (tree, importances) = fit_tree(x.view(), &y, vec![0, 1, 2], &Variance::default(), &params(10), 3);

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.leaf_for(&[100.0]), Some(&8.0));
        assert_eq!(importances, vec![0.0]);
    }

    #[test]
    fn test_short_sample_yields_none() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = vec![0, 0, 1, 1];
        let (tree, _) = fit_tree(x.view(), &y, (0..4).collect(), &Gini::new(2), &params(3), 11);

        assert_eq!(tree.max_feature(), Some(0));
        assert!(tree.leaf_for(&[]).is_none());
    }
}
