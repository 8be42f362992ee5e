//! Leaf-wise regression trees over binned features.

use super::binning::BinnedMatrix;
use super::config::GbdtConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Routing rule of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) enum SplitRule {
    /// `value <= threshold` goes left; missing values follow `missing_left`
    Threshold { threshold: f64, missing_left: bool },
    /// `value == category` goes left; everything else, missing included, right
    Category { category: f64 },
}

impl SplitRule {
    fn goes_left(&self, v: f64) -> bool {
        match *self {
            Self::Threshold {
                threshold,
                missing_left,
            } => {
                if v.is_nan() {
                    missing_left
                } else {
                    v <= threshold
                }
            }
            Self::Category { category } => v == category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        left: usize,
        right: usize,
    },
}

/// A regression tree stored as a node arena, root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    rule,
                    left,
                    right,
                } => {
                    idx = if rule.goes_left(row[*feature]) { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn leaf_value(&self, node: usize) -> f64 {
        match self.nodes[node] {
            Node::Leaf { value } => value,
            Node::Split { .. } => 0.0,
        }
    }

    pub(crate) fn set_leaf(&mut self, node: usize, value: f64) {
        self.nodes[node] = Node::Leaf { value };
    }

    pub(crate) fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// A freshly grown tree with the training rows of each leaf.
#[derive(Debug)]
pub(crate) struct GrownTree {
    pub(crate) tree: Tree,
    pub(crate) leaves: Vec<(usize, Vec<usize>)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl BinStats {
    fn add(&mut self, other: &Self) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Regularization {
    alpha: f64,
    lambda: f64,
}

impl Regularization {
    fn threshold_l1(&self, g: f64) -> f64 {
        if g.abs() <= self.alpha {
            0.0
        } else {
            g - self.alpha * g.signum()
        }
    }

    fn score(&self, s: &BinStats) -> f64 {
        let denom = s.hess + self.lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        let g = self.threshold_l1(s.grad);
        g * g / denom
    }

    fn leaf_value(&self, s: &BinStats) -> f64 {
        let denom = s.hess + self.lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.threshold_l1(s.grad) / denom
    }
}

/// Best split of one leaf, in bin space.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    gain: f64,
    feature: usize,
    kind: BinSplit,
}

#[derive(Debug, Clone, Copy)]
enum BinSplit {
    Threshold { bin: usize, missing_left: bool },
    Category { bin: usize },
}

struct Pending {
    candidate: Candidate,
    node: usize,
    depth: usize,
    rows: Vec<usize>,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // highest gain first, earliest node on ties
        self.candidate
            .gain
            .total_cmp(&other.candidate.gain)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Grows one tree leaf-wise (best gain first) on the gradients.
pub(crate) struct TreeGrower<'a> {
    pub(crate) matrix: &'a BinnedMatrix,
    pub(crate) grad: &'a [f64],
    pub(crate) hess: &'a [f64],
    pub(crate) features: &'a [usize],
    pub(crate) config: &'a GbdtConfig,
}

impl TreeGrower<'_> {
    fn regularization(&self) -> Regularization {
        Regularization {
            alpha: self.config.reg_alpha,
            lambda: self.config.reg_lambda,
        }
    }

    fn totals(&self, rows: &[usize]) -> BinStats {
        let mut s = BinStats::default();
        for &i in rows {
            s.grad += self.grad[i];
            s.hess += self.hess[i];
            s.count += 1;
        }
        s
    }

    fn histogram(&self, feature: usize, rows: &[usize]) -> Vec<BinStats> {
        let bins = &self.matrix.bins[feature];
        let mut hist = vec![BinStats::default(); self.matrix.mappers[feature].n_bins()];
        for &i in rows {
            let b = &mut hist[usize::from(bins[i])];
            b.grad += self.grad[i];
            b.hess += self.hess[i];
            b.count += 1;
        }
        hist
    }

    fn best_split_for_feature(&self, feature: usize, rows: &[usize], total: &BinStats) -> Option<Candidate> {
        let reg = self.regularization();
        let min_child = self.config.min_child_samples.max(1);
        let parent = reg.score(total);
        let mapper = &self.matrix.mappers[feature];
        let hist = self.histogram(feature, rows);

        let mut best: Option<Candidate> = None;
        let mut consider = |left: &BinStats, kind: BinSplit| {
            let right = total.minus(left);
            if left.count < min_child || right.count < min_child {
                return;
            }
            let gain = reg.score(left) + reg.score(&right) - parent;
            if gain > self.config.min_split_gain && best.is_none_or(|b| gain > b.gain) {
                best = Some(Candidate { gain, feature, kind });
            }
        };

        if mapper.categorical {
            for (bin, stats) in hist.iter().enumerate().take(mapper.values.len()) {
                consider(stats, BinSplit::Category { bin });
            }
        } else {
            let missing = hist[mapper.missing_bin()];
            let directions: &[bool] = if missing.count > 0 { &[false, true] } else { &[false] };
            for &missing_left in directions {
                let mut left = BinStats::default();
                if missing_left {
                    left.add(&missing);
                }
                // threshold after bin `bin`; the top regular bin always goes right
                for bin in 0..mapper.values.len() {
                    left.add(&hist[bin]);
                    consider(&left, BinSplit::Threshold { bin, missing_left });
                }
            }
        }

        best
    }

    fn best_split(&self, rows: &[usize]) -> Option<Candidate> {
        if rows.len() < 2 * self.config.min_child_samples.max(1) {
            return None;
        }
        let total = self.totals(rows);
        self.features
            .par_iter()
            .filter_map(|&f| self.best_split_for_feature(f, rows, &total))
            .max_by(|a, b| a.gain.total_cmp(&b.gain).then_with(|| b.feature.cmp(&a.feature)))
    }

    fn goes_left(&self, candidate: &Candidate, row: usize) -> bool {
        let bin = usize::from(self.matrix.bins[candidate.feature][row]);
        let mapper = &self.matrix.mappers[candidate.feature];
        match candidate.kind {
            BinSplit::Threshold { bin: t, missing_left } => {
                if bin == mapper.missing_bin() {
                    missing_left
                } else {
                    bin <= t
                }
            }
            BinSplit::Category { bin: c } => bin == c,
        }
    }

    fn rule(&self, candidate: &Candidate) -> SplitRule {
        let mapper = &self.matrix.mappers[candidate.feature];
        match candidate.kind {
            BinSplit::Threshold { bin, missing_left } => SplitRule::Threshold {
                threshold: mapper.values[bin],
                missing_left,
            },
            BinSplit::Category { bin } => SplitRule::Category {
                category: mapper.values[bin],
            },
        }
    }

    /// Grow a tree over `rows`. Leaf values are the regularized Newton step,
    /// before shrinkage.
    pub(crate) fn grow(&self, rows: Vec<usize>) -> GrownTree {
        let reg = self.regularization();
        let max_depth = self.config.max_depth.unwrap_or(usize::MAX);

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut leaves: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut heap = BinaryHeap::new();

        match self.best_split(&rows) {
            Some(candidate) if max_depth > 0 => heap.push(Pending {
                candidate,
                node: 0,
                depth: 0,
                rows,
            }),
            _ => leaves.push((0, rows)),
        }

        let mut n_leaves = 1;
        while let Some(pending) = heap.pop() {
            if n_leaves >= self.config.num_leaves {
                leaves.push((pending.node, pending.rows));
                continue;
            }

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = pending
                .rows
                .iter()
                .partition(|&&i| self.goes_left(&pending.candidate, i));

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[pending.node] = Node::Split {
                feature: pending.candidate.feature,
                rule: self.rule(&pending.candidate),
                left,
                right,
            };
            n_leaves += 1;

            let depth = pending.depth + 1;
            for (node, child_rows) in [(left, left_rows), (right, right_rows)] {
                let split = if depth < max_depth {
                    self.best_split(&child_rows)
                } else {
                    None
                };
                match split {
                    Some(candidate) => heap.push(Pending {
                        candidate,
                        node,
                        depth,
                        rows: child_rows,
                    }),
                    None => leaves.push((node, child_rows)),
                }
            }
        }

        let mut tree = Tree { nodes };
        for (node, rows) in &leaves {
            tree.set_leaf(*node, reg.leaf_value(&self.totals(rows)));
        }
        GrownTree { tree, leaves }
    }
}
